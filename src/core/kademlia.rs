use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::cli::Shell;
use super::config::Config;
use crate::network::dht::{Client, ClientApi, DhtNode, NodeApi, RpcMessage, Server, StoreReceipt};
use crate::network::{MockRegistry, Network, UdpNetwork};
use crate::utils::Result;

/// A complete DHT participant: node, client and server wired together.
///
/// The server listens on the node's advertised address; the client sends
/// from an endpoint of its own so replies never reach the server loop.
pub struct Kademlia {
    node: Arc<DhtNode>,
    client: Arc<Client>,
    server: Arc<Server>,
    server_network: Arc<dyn Network>,
    client_network: Arc<dyn Network>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Kademlia {
    pub fn new(config: Config, server_network: Arc<dyn Network>, client_network: Arc<dyn Network>) -> Result<Self> {
        config.validate()?;

        let node = Arc::new(DhtNode::new(config.clone()));
        let api: Arc<dyn NodeApi> = node.clone();
        let client = Client::new(&api, client_network.clone(), config.clone());
        node.set_client(client.clone())?;
        let server = Server::new(&api, server_network.clone(), config);

        Ok(Self {
            node,
            client,
            server,
            server_network,
            client_network,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Bind both UDP endpoints. The node advertises the address the
    /// server socket actually got, so port 0 works.
    pub async fn bind_udp(mut config: Config) -> Result<Self> {
        let server_network = UdpNetwork::bind(&config.address).await?;
        let client_bind = match config.address.parse::<SocketAddr>() {
            Ok(addr) => SocketAddr::new(addr.ip(), 0).to_string(),
            Err(_) => "0.0.0.0:0".to_string(),
        };
        let client_network = UdpNetwork::bind(&client_bind).await?;

        config.address = server_network.local_address();
        Self::new(config, Arc::new(server_network), Arc::new(client_network))
    }

    /// Attach to an in-memory network under `config.address`
    pub async fn with_mock(config: Config, registry: &MockRegistry) -> Result<Self> {
        Self::with_lossy_mock(config, registry, 0.0).await
    }

    /// Like [`Kademlia::with_mock`], but both endpoints drop outgoing
    /// packets with probability `drop_rate`
    pub async fn with_lossy_mock(config: Config, registry: &MockRegistry, drop_rate: f64) -> Result<Self> {
        let server_network = registry.register_lossy(&config.address, drop_rate).await;
        let client_network = registry
            .register_lossy(&format!("{}/client", config.address), drop_rate)
            .await;
        Self::new(config, Arc::new(server_network), Arc::new(client_network))
    }

    /// Spawn the client and server loops
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        handles.push(self.client.start());
        handles.extend(self.server.start());
        info!("Kademlia node {} started", self.node.self_contact());
    }

    /// Join through the bootstrap node; a no-op on the bootstrap node itself
    pub async fn join(&self) -> Result<()> {
        self.node.join_network().await
    }

    /// Close both networks and wait for every loop to finish
    pub async fn shutdown(&self) -> Result<()> {
        self.server_network.close().await?;
        self.client_network.close().await?;

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Task failed during shutdown: {}", e);
            }
        }
        info!("Kademlia node {} stopped", self.node.self_contact());
        Ok(())
    }

    /// Replicate `content` on the nodes closest to its hash
    pub async fn put(&self, content: &[u8]) -> Result<StoreReceipt> {
        self.client.send_store_message(content).await
    }

    /// Find the value stored under `hash`, locally or in the network
    pub async fn get(&self, hash: &str) -> Result<RpcMessage> {
        self.client.send_find_value_message(hash).await
    }

    /// Interactive shell bound to this node
    pub fn shell(&self) -> Shell {
        Shell::new(self.node.clone(), self.client.clone())
    }

    pub fn node(&self) -> &Arc<DhtNode> {
        &self.node
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Address peers reach this node on
    pub fn address(&self) -> String {
        self.node.self_contact().address
    }
}
