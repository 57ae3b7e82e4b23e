pub mod dht;
pub mod mock;
pub mod transport;

pub use mock::{MockNetwork, MockRegistry, MockStats};
pub use transport::{Network, UdpNetwork};
