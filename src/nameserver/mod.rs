pub mod conf;
mod server;

pub use server::NameserverHandler;
