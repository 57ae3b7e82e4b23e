use async_trait::async_trait;
use uuid::Uuid;

use super::contact::Contact;
use super::node_id::NodeId;
use super::rpc::RpcMessage;
use crate::utils::Result;

/// What the client and the server need from the local node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    fn self_contact(&self) -> Contact;

    /// Run the liveness-checked admission policy for `contact`
    async fn add_contact(&self, contact: Contact);

    /// The `alpha` closest contacts known locally
    async fn lookup_closest_contacts(&self, target: &NodeId) -> Vec<Contact>;

    async fn iterative_find_node(&self, target: NodeId) -> Result<Vec<Contact>>;

    async fn lookup_data(&self, key: &str) -> Option<Vec<u8>>;

    async fn store(&self, key: String, data: Vec<u8>);
}

/// Outbound RPCs used by the node.
#[async_trait]
pub trait ClientApi: Send + Sync {
    async fn send_ping_message(&self, target: &Contact) -> Result<RpcMessage>;

    async fn send_find_node_message(&self, target: NodeId, contact: &Contact) -> Result<Vec<Contact>>;

    async fn send_store_message(&self, data: &[u8]) -> Result<StoreReceipt>;

    async fn send_find_value_message(&self, hash: &str) -> Result<RpcMessage>;
}

/// Outcome of a successful network-wide STORE
#[derive(Debug, Clone, PartialEq)]
pub struct StoreReceipt {
    /// Hex key the data was stored under
    pub key: String,
    /// Correlation id of the first acknowledgement
    pub packet_id: Uuid,
    /// Nodes that acknowledged
    pub replicas: Vec<Contact>,
}
