use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::node_id::NodeId;

/// Represents a contact (peer) in the DHT network
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    pub id: NodeId,
    pub address: String,
    /// Distance to the last target passed to [`Contact::calc_distance`].
    #[serde(skip)]
    pub distance: Option<NodeId>,
}

impl Contact {
    /// Create a new contact
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            distance: None,
        }
    }

    /// Compute and cache the distance to `target`
    pub fn calc_distance(&mut self, target: &NodeId) -> NodeId {
        let distance = self.id.distance(target);
        self.distance = Some(distance);
        distance
    }

    /// Compare cached distances. Both contacts must have been measured
    /// against the same target; an unmeasured contact sorts last.
    pub fn less(&self, other: &Contact) -> bool {
        match (&self.distance, &other.distance) {
            (Some(a), Some(b)) => a.less(b),
            (Some(_), None) => true,
            _ => false,
        }
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.address == other.address
    }
}

impl Eq for Contact {}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contact(\"{}\", \"{}\")", self.id, self.address)
    }
}

/// Batch of contacts measured against one target, sortable by distance.
#[derive(Debug, Default, Clone)]
pub struct ContactCandidates {
    contacts: Vec<Contact>,
}

impl ContactCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measure every contact against `target` and append them
    pub fn append(&mut self, contacts: impl IntoIterator<Item = Contact>, target: &NodeId) {
        self.contacts.extend(contacts.into_iter().map(|mut c| {
            c.calc_distance(target);
            c
        }));
    }

    /// Closest first; unmeasured contacts go last
    pub fn sort(&mut self) {
        self.contacts.sort_by(by_distance);
    }

    pub fn get_contacts(&self, count: usize) -> Vec<Contact> {
        self.contacts.iter().take(count).cloned().collect()
    }

    pub fn into_inner(self) -> Vec<Contact> {
        self.contacts
    }
}

fn by_distance(a: &Contact, b: &Contact) -> Ordering {
    if a.less(b) {
        Ordering::Less
    } else if b.less(a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}
