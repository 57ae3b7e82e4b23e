//! Mini Kademlia
//!
//! A Kademlia distributed hash table node: XOR-metric routing, liveness
//! checked bucket admission, iterative lookup and replicated storage over
//! an unreliable datagram transport.

pub mod core;
pub mod network;
pub mod utils;

// Re-export main types
pub use crate::core::{Config, Kademlia, Shell};
pub use network::dht::{ClientApi, Contact, DhtNode, NodeApi, NodeId, StoreReceipt};
pub use network::{MockNetwork, MockRegistry, Network, UdpNetwork};
pub use utils::{
    NodeUtils,
    error::{DhtError, Result},
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
