use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::utils::{DhtError, Result};

/// Identifier width in bytes.
pub const ID_LENGTH: usize = 20;
/// Identifier width in bits, and the number of buckets in a routing table.
pub const ID_BITS: usize = ID_LENGTH * 8;

/// 160-bit identifier locating a node or a key in the DHT.
///
/// Ordering is the unsigned big-endian value of the bytes, so a
/// distance produced by [`NodeId::distance`] orders by closeness.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId([u8; ID_LENGTH]);

impl NodeId {
    /// Create a new NodeId from raw bytes
    pub fn new(bytes: [u8; ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The all-zero identifier reserved for the bootstrap node
    pub fn zero() -> Self {
        Self([0u8; ID_LENGTH])
    }

    /// Generate a random NodeId
    pub fn random() -> Self {
        let random_bytes: [u8; ID_LENGTH] = rand::random();
        Self(random_bytes)
    }

    /// XOR distance between two identifiers
    pub fn distance(&self, other: &NodeId) -> NodeId {
        let mut result = [0u8; ID_LENGTH];
        for (i, byte) in result.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        NodeId(result)
    }

    /// Unsigned lexicographic comparison
    pub fn less(&self, other: &NodeId) -> bool {
        self.0 < other.0
    }

    /// Number of leading bits shared with `other` (`ID_BITS` when equal)
    pub fn common_prefix_len(&self, other: &NodeId) -> usize {
        for (byte_idx, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
            let diff = a ^ b;
            if diff != 0 {
                return byte_idx * 8 + diff.leading_zeros() as usize;
            }
        }
        ID_BITS
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| DhtError::InvalidId(format!("{}: {}", s, e)))?;
        let array: [u8; ID_LENGTH] = bytes.try_into().map_err(|_| {
            DhtError::InvalidId(format!("{}: expected {} bytes", s, ID_LENGTH))
        })?;
        Ok(Self(array))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NodeId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
