use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, mpsc};

use super::transport::Network;
use crate::utils::{DhtError, Result};

/// Inbox depth per registered address; packets beyond it are lost
pub const MOCK_INBOX_SIZE: usize = 1000;

struct MockPacket {
    src: String,
    data: Vec<u8>,
}

/// Address book shared by every [`MockNetwork`] of one simulated network.
#[derive(Clone, Default)]
pub struct MockRegistry {
    inboxes: Arc<RwLock<HashMap<String, mpsc::Sender<MockPacket>>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a lossless endpoint at `addr`
    pub async fn register(&self, addr: &str) -> MockNetwork {
        self.register_lossy(addr, 0.0).await
    }

    /// Attach an endpoint whose outgoing packets are dropped with probability `drop_rate`
    pub async fn register_lossy(&self, addr: &str, drop_rate: f64) -> MockNetwork {
        let (tx, rx) = mpsc::channel(MOCK_INBOX_SIZE);
        self.inboxes.write().await.insert(addr.to_string(), tx);
        MockNetwork {
            addr: addr.to_string(),
            registry: self.clone(),
            inbox: Mutex::new(rx),
            drop_rate,
            stats: Arc::new(MockStats::default()),
        }
    }

    async fn get(&self, addr: &str) -> Option<mpsc::Sender<MockPacket>> {
        self.inboxes.read().await.get(addr).cloned()
    }

    async fn unregister(&self, addr: &str) {
        self.inboxes.write().await.remove(addr);
    }

    pub async fn contains(&self, addr: &str) -> bool {
        self.inboxes.read().await.contains_key(addr)
    }
}

/// Delivery counters of one endpoint
#[derive(Default, Debug)]
pub struct MockStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl MockStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// In-memory [`Network`] endpoint registered in a [`MockRegistry`].
pub struct MockNetwork {
    addr: String,
    registry: MockRegistry,
    inbox: Mutex<mpsc::Receiver<MockPacket>>,
    drop_rate: f64,
    stats: Arc<MockStats>,
}

impl MockNetwork {
    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn send(&self, addr: &str, data: &[u8]) -> Result<()> {
        let inbox = self
            .registry
            .get(addr)
            .await
            .ok_or_else(|| DhtError::AddressNotFound(addr.to_string()))?;

        // Lost in transit: the sender cannot tell.
        if self.drop_rate > 0.0 && rand::random::<f64>() < self.drop_rate {
            debug!("Dropping packet {} -> {}", self.addr, addr);
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let packet = MockPacket {
            src: self.addr.clone(),
            data: data.to_vec(),
        };
        match inbox.try_send(packet) {
            Ok(()) => self.stats.delivered.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.stats.dropped.fetch_add(1, Ordering::Relaxed),
        };
        Ok(())
    }

    async fn receive(&self) -> Result<(String, Vec<u8>)> {
        match self.inbox.lock().await.recv().await {
            Some(packet) => Ok((packet.src, packet.data)),
            None => Err(DhtError::Closed),
        }
    }

    async fn close(&self) -> Result<()> {
        // Dropping the registry's sender ends a pending `receive` once the
        // inbox drains; closing here also rejects in-flight sends.
        self.registry.unregister(&self.addr).await;
        if let Ok(mut inbox) = self.inbox.try_lock() {
            inbox.close();
        }
        Ok(())
    }

    fn local_address(&self) -> String {
        self.addr.clone()
    }
}
