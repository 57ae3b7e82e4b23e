use log::{debug, info, warn};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::core::Config;
use crate::network::Network;
use crate::utils::DhtError;

use super::api::NodeApi;
use super::contact::Contact;
use super::node_id::NodeId;
use super::rpc::{Payload, RpcMessage, RpcType};

/// Request waiting for a worker
#[derive(Debug, Clone)]
pub struct IncomingRpc {
    pub rpc: RpcMessage,
    /// Source address of the datagram
    pub addr: String,
}

/// Response waiting for the send loop
#[derive(Debug, Clone)]
pub struct OutgoingRpc {
    pub rpc: RpcMessage,
    pub addr: String,
}

/// Inbound side of a node.
///
/// receive loop -> incoming queue -> worker pool -> outgoing queue -> send loop
pub struct Server {
    node: Weak<dyn NodeApi>,
    network: Arc<dyn Network>,
    config: Config,
}

impl Server {
    pub fn new(node: &Arc<dyn NodeApi>, network: Arc<dyn Network>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            node: Arc::downgrade(node),
            network,
            config,
        })
    }

    /// Spawn every loop of the pipeline. They wind down in order once the
    /// network is closed.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            "Starting DHT server on {} with {} workers",
            self.network.local_address(),
            self.config.server_workers
        );

        let (incoming_tx, incoming_rx) = mpsc::channel(self.config.incoming_queue);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(self.config.outgoing_queue);
        let incoming_rx = Arc::new(Mutex::new(incoming_rx));

        let mut handles = vec![self.start_receiver(incoming_tx)];
        for worker in 0..self.config.server_workers {
            handles.push(self.start_worker(worker, incoming_rx.clone(), outgoing_tx.clone()));
        }
        handles.push(self.start_sender(outgoing_rx));
        handles
    }

    fn start_receiver(self: &Arc<Self>, incoming: mpsc::Sender<IncomingRpc>) -> JoinHandle<()> {
        let network = self.network.clone();

        tokio::spawn(async move {
            loop {
                let (addr, data) = match network.receive().await {
                    Ok(received) => received,
                    Err(DhtError::Closed) => break,
                    Err(e) => {
                        warn!("Server receive error: {}", e);
                        continue;
                    }
                };

                let rpc = match RpcMessage::decode(&data) {
                    Ok(rpc) => rpc,
                    Err(e) => {
                        debug!("Dropping undecodable datagram from {}: {}", addr, e);
                        continue;
                    }
                };
                if rpc.is_response() {
                    debug!("Server ignoring {} response from {}", rpc.msg_type, addr);
                    continue;
                }

                match incoming.try_send(IncomingRpc { rpc, addr }) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(dropped)) => {
                        warn!(
                            "Incoming queue full, dropping {} from {}",
                            dropped.rpc.msg_type, dropped.addr
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            debug!("Server receive loop stopped");
        })
    }

    fn start_worker(
        self: &Arc<Self>,
        worker: usize,
        incoming: Arc<Mutex<mpsc::Receiver<IncomingRpc>>>,
        outgoing: mpsc::Sender<OutgoingRpc>,
    ) -> JoinHandle<()> {
        let node = self.node.clone();

        tokio::spawn(async move {
            loop {
                let next = incoming.lock().await.recv().await;
                let Some(request) = next else { break };
                let Some(node) = node.upgrade() else { break };

                let response = Self::process_request(&*node, &request).await;
                let reply = OutgoingRpc {
                    rpc: response,
                    addr: request.addr.clone(),
                };
                if outgoing.send(reply).await.is_err() {
                    break;
                }

                if let Some(requester) = request.rpc.payload.source_contact {
                    node.add_contact(requester).await;
                }
            }
            debug!("Server worker {} stopped", worker);
        })
    }

    fn start_sender(self: &Arc<Self>, mut outgoing: mpsc::Receiver<OutgoingRpc>) -> JoinHandle<()> {
        let network = self.network.clone();

        tokio::spawn(async move {
            while let Some(reply) = outgoing.recv().await {
                let data = match reply.rpc.encode() {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("Failed to encode {} reply: {}", reply.rpc.msg_type, e);
                        continue;
                    }
                };
                if let Err(e) = network.send(&reply.addr, &data).await {
                    warn!("Failed to send {} to {}: {}", reply.rpc.msg_type, reply.addr, e);
                }
            }
            debug!("Server send loop stopped");
        })
    }

    /// Build the response to one request
    pub async fn process_request(node: &dyn NodeApi, request: &IncomingRpc) -> RpcMessage {
        let rpc = &request.rpc;
        let requester = rpc.payload.source_contact.clone();
        debug!("Processing {} {} from {}", rpc.msg_type, rpc.packet_id, request.addr);

        let (msg_type, mut payload) = match rpc.msg_type {
            RpcType::Ping => (
                RpcType::Pong,
                Payload {
                    target_contact: requester,
                    ..Default::default()
                },
            ),
            RpcType::FindNode => match NodeId::from_hex(&rpc.payload.key) {
                Ok(target) => (
                    RpcType::FindNode,
                    Payload {
                        key: rpc.payload.key.clone(),
                        contacts: node.lookup_closest_contacts(&target).await,
                        ..Default::default()
                    },
                ),
                Err(e) => error_payload(e.to_string(), requester),
            },
            RpcType::Store => match &rpc.payload.data {
                Some(data) if !rpc.payload.key.is_empty() => {
                    node.store(rpc.payload.key.clone(), data.clone()).await;
                    (
                        RpcType::Store,
                        Payload {
                            key: rpc.payload.key.clone(),
                            contacts: vec![node.self_contact()],
                            ..Default::default()
                        },
                    )
                }
                _ => error_payload("STORE needs a key and data".to_string(), requester),
            },
            RpcType::FindValue => (
                RpcType::FindValue,
                Payload {
                    key: rpc.payload.key.clone(),
                    data: node.lookup_data(&rpc.payload.key).await,
                    ..Default::default()
                },
            ),
            other => error_payload(format!("unsupported request {}", other), requester),
        };

        payload.source_contact = Some(node.self_contact());
        RpcMessage::reply_to(rpc, msg_type, payload)
    }
}

fn error_payload(error: String, requester: Option<Contact>) -> (RpcType, Payload) {
    (
        RpcType::Error,
        Payload {
            error,
            target_contact: requester,
            ..Default::default()
        },
    )
}
