use async_trait::async_trait;
use log::{debug, info};
use std::net::SocketAddr;
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::watch;

use crate::utils::{DhtError, NodeUtils, Result};

/// Largest datagram accepted from the socket
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Unreliable datagram transport consumed by the client and the server.
#[async_trait]
pub trait Network: Send + Sync {
    /// Send one datagram. Address resolution and send failures surface here.
    async fn send(&self, addr: &str, data: &[u8]) -> Result<()>;

    /// Wait for the next datagram. Returns [`DhtError::Closed`] after `close`.
    async fn receive(&self) -> Result<(String, Vec<u8>)>;

    async fn close(&self) -> Result<()>;

    fn local_address(&self) -> String;
}

/// [`Network`] over a UDP socket.
pub struct UdpNetwork {
    socket: UdpSocket,
    local_addr: SocketAddr,
    closed: watch::Sender<bool>,
}

impl UdpNetwork {
    pub async fn bind(addr: &str) -> Result<Self> {
        let bind_addr = resolve(addr).await?;
        let socket = NodeUtils::create_reusable_udp_socket(bind_addr)?;
        let local_addr = NodeUtils::advertised_address(socket.local_addr()?);
        let (closed, _) = watch::channel(false);

        info!("UDP network bound on {}", local_addr);
        Ok(Self {
            socket,
            local_addr,
            closed,
        })
    }
}

#[async_trait]
impl Network for UdpNetwork {
    async fn send(&self, addr: &str, data: &[u8]) -> Result<()> {
        if *self.closed.borrow() {
            return Err(DhtError::Closed);
        }
        let target = resolve(addr).await?;
        self.socket
            .send_to(data, target)
            .await
            .map_err(|e| DhtError::NetworkError(format!("Failed to send to {}: {}", addr, e)))?;
        Ok(())
    }

    async fn receive(&self) -> Result<(String, Vec<u8>)> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(DhtError::Closed);
        }

        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        tokio::select! {
            received = self.socket.recv_from(&mut buffer) => {
                let (len, from) = received?;
                buffer.truncate(len);
                Ok((from.to_string(), buffer))
            }
            _ = closed.changed() => Err(DhtError::Closed),
        }
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing UDP network {}", self.local_addr);
        self.closed.send_replace(true);
        Ok(())
    }

    fn local_address(&self) -> String {
        self.local_addr.to_string()
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr> {
    lookup_host(addr)
        .await
        .map_err(|e| DhtError::AddressNotFound(format!("{}: {}", addr, e)))?
        .next()
        .ok_or_else(|| DhtError::AddressNotFound(addr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_round_trip() {
        let a = UdpNetwork::bind("127.0.0.1:0").await.unwrap();
        let b = UdpNetwork::bind("127.0.0.1:0").await.unwrap();

        a.send(&b.local_address(), b"hello").await.unwrap();
        let (from, data) = b.receive().await.unwrap();

        assert_eq!(from, a.local_address());
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_send_to_unresolvable_address_fails() {
        let a = UdpNetwork::bind("127.0.0.1:0").await.unwrap();
        let err = a.send("invalid:address", b"x").await.unwrap_err();
        assert!(matches!(err, DhtError::AddressNotFound(_)));
    }

    #[tokio::test]
    async fn test_close_wakes_receiver() {
        let network = std::sync::Arc::new(UdpNetwork::bind("127.0.0.1:0").await.unwrap());
        let receiver = network.clone();
        let handle = tokio::spawn(async move { receiver.receive().await });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        network.close().await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(DhtError::Closed)));
        assert!(matches!(network.receive().await, Err(DhtError::Closed)));
    }
}
