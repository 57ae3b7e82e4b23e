use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Arc, Weak};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Duration, timeout};

use crate::core::Config;
use crate::network::Network;
use crate::utils::{DhtError, KeyHasher, Result, Sha256KeyHasher};

use super::api::{ClientApi, NodeApi, StoreReceipt};
use super::contact::Contact;
use super::node_id::NodeId;
use super::pending::{PendingReply, PendingRequests};
use super::rpc::{Payload, RpcMessage, RpcType};

/// Correlated request/response over a [`Network`].
///
/// Cheap to clone; clones share the socket and the pending registry.
#[derive(Clone)]
pub struct RpcChannel {
    network: Arc<dyn Network>,
    pending: PendingRequests,
    self_contact: Contact,
}

impl RpcChannel {
    pub fn new(network: Arc<dyn Network>, self_contact: Contact) -> Self {
        Self {
            network,
            pending: PendingRequests::new(),
            self_contact,
        }
    }

    /// Stamp, register and transmit `message`. The returned slot yields
    /// the correlated reply; dropping it unregisters the request.
    pub async fn send_message(&self, target: &Contact, mut message: RpcMessage) -> Result<PendingReply> {
        message.payload.source_contact = Some(self.self_contact.clone());
        let data = message.encode()?;
        let packet_id = message.packet_id;

        let reply = self.pending.register(packet_id);
        self.network.send(&target.address, &data).await?;

        debug!("Sent {} {} to {}", message.msg_type, packet_id, target);
        Ok(reply)
    }

    /// Send and wait up to `wait` for the reply. Once the wait ends, or
    /// the caller abandons this future, a late reply is simply dropped.
    pub async fn request(&self, target: &Contact, message: RpcMessage, wait: Duration) -> Result<RpcMessage> {
        let packet_id = message.packet_id;
        let reply = self.send_message(target, message).await?;

        match timeout(wait, reply).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Request {} to {} timed out", packet_id, target);
                Err(DhtError::Timeout)
            }
        }
    }

    /// Demultiplex replies until the network closes
    async fn receive_loop(self) {
        debug!("Client receive loop started on {}", self.network.local_address());

        loop {
            let (from, data) = match self.network.receive().await {
                Ok(received) => received,
                Err(DhtError::Closed) => break,
                Err(e) => {
                    warn!("Client receive error: {}", e);
                    continue;
                }
            };

            let message = match RpcMessage::decode(&data) {
                Ok(message) => message,
                Err(e) => {
                    debug!("Dropping undecodable datagram from {}: {}", from, e);
                    continue;
                }
            };

            if message.is_request() {
                debug!("Client ignoring {} request from {}", message.msg_type, from);
                continue;
            }

            let packet_id = message.packet_id;
            if !self.pending.resolve(message) {
                debug!("Dropping unmatched reply {} from {}", packet_id, from);
            }
        }

        debug!("Client receive loop stopped");
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
}

/// Outbound side of a node: single RPCs plus the multi-node STORE and
/// FIND_VALUE operations built on the iterative lookup.
pub struct Client {
    node: Weak<dyn NodeApi>,
    channel: RpcChannel,
    hasher: Arc<dyn KeyHasher>,
    config: Config,
}

impl Client {
    pub fn new(node: &Arc<dyn NodeApi>, network: Arc<dyn Network>, config: Config) -> Arc<Self> {
        Self::with_hasher(node, network, config, Arc::new(Sha256KeyHasher))
    }

    pub fn with_hasher(
        node: &Arc<dyn NodeApi>,
        network: Arc<dyn Network>,
        config: Config,
        hasher: Arc<dyn KeyHasher>,
    ) -> Arc<Self> {
        let channel = RpcChannel::new(network, node.self_contact());
        Arc::new(Self {
            node: Arc::downgrade(node),
            channel,
            hasher,
            config,
        })
    }

    /// Spawn the reply demultiplexer
    pub fn start(&self) -> JoinHandle<()> {
        tokio::spawn(self.channel.clone().receive_loop())
    }

    pub fn channel(&self) -> &RpcChannel {
        &self.channel
    }

    /// Key under which `data` is stored
    pub fn key_for(&self, data: &[u8]) -> NodeId {
        self.hasher.hash(data)
    }

    fn node(&self) -> Result<Arc<dyn NodeApi>> {
        self.node.upgrade().ok_or(DhtError::Closed)
    }
}

#[async_trait]
impl ClientApi for Client {
    async fn send_ping_message(&self, target: &Contact) -> Result<RpcMessage> {
        let reply = self
            .channel
            .request(target, RpcMessage::ping(), self.config.ping_timeout())
            .await?;
        expect_type(reply, RpcType::Pong)
    }

    async fn send_find_node_message(&self, target: NodeId, contact: &Contact) -> Result<Vec<Contact>> {
        let reply = self
            .channel
            .request(contact, RpcMessage::find_node(target.to_hex()), self.config.rpc_timeout())
            .await?;
        let contacts = expect_type(reply, RpcType::FindNode)?.payload.contacts;

        // Admission may ping the tail of a full bucket; that wait is not
        // part of this call.
        let node = self.node()?;
        let discovered = contacts.clone();
        tokio::spawn(async move {
            for found in discovered {
                node.add_contact(found).await;
            }
        });
        Ok(contacts)
    }

    async fn send_store_message(&self, data: &[u8]) -> Result<StoreReceipt> {
        let node = self.node()?;
        let key_id = self.key_for(data);
        let key = key_id.to_hex();
        let candidates = node.iterative_find_node(key_id).await?;

        let wait = self.config.rpc_timeout();
        let mut acks = JoinSet::new();
        for contact in candidates {
            let channel = self.channel.clone();
            let message = RpcMessage::store(key.clone(), data.to_vec());
            acks.spawn(async move {
                let reply = channel.request(&contact, message, wait).await;
                (contact, reply)
            });
        }

        let mut replicas = Vec::new();
        let mut first_ack = None;
        while let Some(joined) = acks.join_next().await {
            match joined {
                Ok((contact, Ok(reply))) if reply.msg_type == RpcType::Store => {
                    first_ack.get_or_insert(reply.packet_id);
                    replicas.push(contact);
                }
                Ok((contact, Ok(reply))) => {
                    warn!("Unexpected {} to STORE from {}", reply.msg_type, contact);
                }
                Ok((contact, Err(e))) => debug!("STORE to {} failed: {}", contact, e),
                Err(e) => warn!("STORE task failed: {}", e),
            }
        }

        let required = self.config.min_replicas;
        match first_ack {
            Some(packet_id) if replicas.len() >= required => {
                info!("Stored {} on {} replicas", key, replicas.len());
                Ok(StoreReceipt {
                    key,
                    packet_id,
                    replicas,
                })
            }
            _ => Err(DhtError::InsufficientReplicas {
                acked: replicas.len(),
                required,
            }),
        }
    }

    async fn send_find_value_message(&self, hash: &str) -> Result<RpcMessage> {
        let key_id = NodeId::from_hex(hash)?;
        let key = key_id.to_hex();
        let node = self.node()?;

        if let Some(data) = node.lookup_data(&key).await.filter(|d| !d.is_empty()) {
            debug!("Value {} found locally", key);
            return Ok(RpcMessage::new(
                RpcType::FindValue,
                Payload {
                    key,
                    data: Some(data),
                    source_contact: Some(node.self_contact()),
                    ..Default::default()
                },
                false,
            ));
        }

        // Candidates come back closest first.
        let candidates = node.iterative_find_node(key_id).await?;
        for contact in candidates {
            let message = RpcMessage::find_value(key.clone());
            match self.channel.request(&contact, message, self.config.rpc_timeout()).await {
                Ok(reply) if has_value(&reply) => return Ok(reply),
                Ok(_) => debug!("{} does not hold {}", contact, key),
                Err(e) => debug!("FIND_VALUE to {} failed: {}", contact, e),
            }
        }

        Err(DhtError::NotFound(key))
    }
}

fn has_value(reply: &RpcMessage) -> bool {
    reply.msg_type == RpcType::FindValue && reply.payload.data.as_ref().is_some_and(|d| !d.is_empty())
}

fn expect_type(reply: RpcMessage, expected: RpcType) -> Result<RpcMessage> {
    if reply.msg_type == expected {
        Ok(reply)
    } else {
        Err(DhtError::UnexpectedResponse(format!(
            "expected {}, got {} {}",
            expected, reply.msg_type, reply.payload.error
        )))
    }
}
