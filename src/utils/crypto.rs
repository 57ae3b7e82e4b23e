use sha2::{Digest, Sha256};

use crate::network::dht::{ID_LENGTH, NodeId};

/// Maps opaque data onto a key in the identifier space.
pub trait KeyHasher: Send + Sync {
    fn hash(&self, data: &[u8]) -> NodeId;
}

/// SHA-256 truncated to the identifier width.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256KeyHasher;

impl KeyHasher for Sha256KeyHasher {
    fn hash(&self, data: &[u8]) -> NodeId {
        let digest = Sha256::digest(data);
        let mut bytes = [0u8; ID_LENGTH];
        bytes.copy_from_slice(&digest[..ID_LENGTH]);
        NodeId::new(bytes)
    }
}
