pub mod fixtures;

pub use fixtures::{TcpCollector, reassemble, tcp_collector, udp_collector};
