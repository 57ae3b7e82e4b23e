use log::debug;

use super::bucket::Bucket;
use super::contact::{Contact, ContactCandidates};
use super::node_id::{ID_BITS, NodeId};

/// Routing table for DHT
///
/// Bucket `i` holds contacts whose ids share exactly `i` leading bits with
/// the owner; index 0 is the most distant half of the space. Capacity is
/// not enforced here, see `DhtNode::add_contact`.
#[derive(Debug)]
pub struct RoutingTable {
    me: Contact,
    buckets: Vec<Bucket>,
}

impl RoutingTable {
    /// Create a new routing table
    pub fn new(me: Contact) -> Self {
        let buckets = (0..ID_BITS).map(|_| Bucket::new()).collect();
        Self { me, buckets }
    }

    pub fn me(&self) -> &Contact {
        &self.me
    }

    /// Index of the first bit where `id` differs from the owner id,
    /// or the last bucket when the ids are identical
    pub fn bucket_index(&self, id: &NodeId) -> usize {
        self.me.id.common_prefix_len(id).min(ID_BITS - 1)
    }

    /// Insert into the indexed bucket unconditionally
    pub fn add_contact(&mut self, contact: Contact) {
        let index = self.bucket_index(&contact.id);
        debug!("Adding {} to bucket {}", contact, index);
        self.buckets[index].add_contact(contact);
    }

    pub fn bucket(&self, index: usize) -> &Bucket {
        &self.buckets[index]
    }

    pub fn bucket_mut(&mut self, index: usize) -> &mut Bucket {
        &mut self.buckets[index]
    }

    /// Find the `count` closest contacts to a target ID
    pub fn find_closest_contacts(&self, target: &NodeId, count: usize) -> Vec<Contact> {
        let mut candidates = ContactCandidates::new();
        for bucket in &self.buckets {
            candidates.append(bucket.iter().cloned(), target);
        }
        candidates.sort();
        candidates.get_contacts(count)
    }

    /// Get the total number of contacts
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-empty buckets with their index, nearest prefix first
    pub fn occupied_buckets(&self) -> impl Iterator<Item = (usize, &Bucket)> {
        self.buckets
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, bucket)| !bucket.is_empty())
    }
}
