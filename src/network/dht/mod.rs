//! Kademlia distributed hash table
//!
//! Identifiers and XOR distance, the bucketed routing table, the node
//! (admission policy and iterative lookup) and the RPC client/server pair
//! that speaks the JSON datagram protocol.

mod api;
mod bucket;
mod client;
mod contact;
mod dht_node;
mod node_id;
mod pending;
mod routing_table;
mod rpc;
mod server;

pub use api::{ClientApi, NodeApi, StoreReceipt};
pub use bucket::{BUCKET_SIZE, Bucket};
pub use client::{Client, RpcChannel};
pub use contact::{Contact, ContactCandidates};
pub use dht_node::DhtNode;
pub use node_id::{ID_BITS, ID_LENGTH, NodeId};
pub use pending::{PendingReply, PendingRequests};
pub use routing_table::RoutingTable;
pub use rpc::{Payload, RpcMessage, RpcType};
pub use server::{IncomingRpc, OutgoingRpc, Server};
