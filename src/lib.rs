pub mod nameserver;
pub mod shared;
pub mod zone;
