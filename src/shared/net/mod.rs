mod setup;
mod tcp_server;
mod traits;
mod udp_server;

pub use setup::*;
pub use tcp_server::TcpParams;
pub use traits::*;
pub use udp_server::UdpParams;
