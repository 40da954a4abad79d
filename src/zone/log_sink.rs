use crate::shared::log;
use std::sync::{OnceLock, RwLock};

/// `write_message`/`write_exception` is the whole logging surface the
/// zone core depends on. It logs exclusively through a [`LogSink`] so it
/// never couples to a specific logging backend, and never blocks on
/// logging since a sink implementation is free to buffer or drop.
pub trait LogSink: Send + Sync {
    fn write_message(&self, message: &str);
    fn write_exception(&self, err: &dyn std::error::Error);
}

/// Default sink: routes through the colorized, leveled console writer in
/// [`crate::shared::log`].
pub struct ConsoleLogSink;

impl LogSink for ConsoleLogSink {
    fn write_message(&self, message: &str) {
        log::info!("{}", message);
    }

    fn write_exception(&self, err: &dyn std::error::Error) {
        log::error!("{}", err);
    }
}

static SINK: OnceLock<RwLock<Box<dyn LogSink>>> = OnceLock::new();

fn sink() -> &'static RwLock<Box<dyn LogSink>> {
    SINK.get_or_init(|| RwLock::new(Box::new(ConsoleLogSink)))
}

/// Installs a [`LogSink`] implementation, replacing the default console
/// sink. Intended to be called once at process startup.
pub fn set_sink(new_sink: Box<dyn LogSink>) {
    *sink().write().unwrap() = new_sink;
}

pub fn write_message(message: &str) {
    sink().read().unwrap().write_message(message);
}

pub fn write_exception(err: &dyn std::error::Error) {
    sink().read().unwrap().write_exception(err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingSink {
        messages: Mutex<Vec<String>>,
    }

    impl LogSink for CapturingSink {
        fn write_message(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
        fn write_exception(&self, err: &dyn std::error::Error) {
            self.messages.lock().unwrap().push(err.to_string());
        }
    }

    #[test]
    fn default_sink_does_not_panic() {
        write_message("hello from the zone core");
    }
}
