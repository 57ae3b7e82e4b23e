use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::utils::{DhtError, Result};

use super::rpc::RpcMessage;

type Waiters = Arc<Mutex<HashMap<Uuid, oneshot::Sender<RpcMessage>>>>;

fn lock(waiters: &Waiters) -> MutexGuard<'_, HashMap<Uuid, oneshot::Sender<RpcMessage>>> {
    waiters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Outstanding requests keyed by correlation id.
///
/// Entries leave the map exactly once: when the matching reply is
/// delivered, or when the [`PendingReply`] waiting on it is dropped.
#[derive(Clone, Default)]
pub struct PendingRequests {
    waiters: Waiters,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, packet_id: Uuid) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        lock(&self.waiters).insert(packet_id, tx);
        PendingReply {
            packet_id,
            rx,
            waiters: self.waiters.clone(),
        }
    }

    /// Hand `message` to its waiter. Returns false when nobody is waiting.
    pub fn resolve(&self, message: RpcMessage) -> bool {
        let waiter = lock(&self.waiters).remove(&message.packet_id);
        match waiter {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.waiters).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reply slot for one registered request.
///
/// Resolves to the correlated reply. Dropping it unregisters the request,
/// whether the caller timed out itself or was cancelled from outside.
pub struct PendingReply {
    packet_id: Uuid,
    rx: oneshot::Receiver<RpcMessage>,
    waiters: Waiters,
}

impl Future for PendingReply {
    type Output = Result<RpcMessage>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.map_err(|_| DhtError::Closed))
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        lock(&self.waiters).remove(&self.packet_id);
    }
}
