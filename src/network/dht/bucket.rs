use std::collections::VecDeque;

use super::contact::Contact;
use super::node_id::NodeId;

/// Default bucket capacity (Kademlia `k`)
pub const BUCKET_SIZE: usize = 20;

/// Contacts sharing a prefix length with the owner, most recently
/// confirmed alive at the front.
///
/// The bucket does not enforce its capacity; the node's admission
/// policy decides what gets in once it is full.
#[derive(Clone, Debug, Default)]
pub struct Bucket {
    contacts: VecDeque<Contact>,
}

impl Bucket {
    pub fn new() -> Self {
        Self {
            contacts: VecDeque::new(),
        }
    }

    /// Insert at the front, or move an existing entry (same id) to the front
    pub fn add_contact(&mut self, contact: Contact) {
        if let Some(pos) = self.position(&contact.id) {
            self.contacts.remove(pos);
        }
        self.contacts.push_front(contact);
    }

    /// Move an existing entry to the front. Returns false if absent.
    pub fn refresh(&mut self, id: &NodeId) -> bool {
        match self.position(id).and_then(|pos| self.contacts.remove(pos)) {
            Some(existing) => {
                self.contacts.push_front(existing);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Contact> {
        self.position(id).and_then(|pos| self.contacts.remove(pos))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.position(id).is_some()
    }

    /// Least recently confirmed contact
    pub fn back(&self) -> Option<&Contact> {
        self.contacts.back()
    }

    pub fn front(&self) -> Option<&Contact> {
        self.contacts.front()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Front-to-back traversal
    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    fn position(&self, id: &NodeId) -> Option<usize> {
        self.contacts.iter().position(|c| &c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(n: u8) -> Contact {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Contact::new(NodeId::new(bytes), format!("127.0.0.1:{}", 8000 + n as u16))
    }

    #[test]
    fn test_add_prepends() {
        let mut bucket = Bucket::new();
        bucket.add_contact(contact(1));
        bucket.add_contact(contact(2));

        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket.front(), Some(&contact(2)));
        assert_eq!(bucket.back(), Some(&contact(1)));
    }

    #[test]
    fn test_readd_moves_to_front_without_growing() {
        let mut bucket = Bucket::new();
        for n in 1..=3 {
            bucket.add_contact(contact(n));
        }
        bucket.add_contact(contact(1));

        assert_eq!(bucket.len(), 3);
        let order: Vec<Contact> = bucket.iter().cloned().collect();
        assert_eq!(order, vec![contact(1), contact(3), contact(2)]);
    }

    #[test]
    fn test_refresh_and_remove() {
        let mut bucket = Bucket::new();
        bucket.add_contact(contact(1));
        bucket.add_contact(contact(2));

        assert!(bucket.refresh(&contact(1).id));
        assert_eq!(bucket.front(), Some(&contact(1)));
        assert!(!bucket.refresh(&contact(9).id));

        assert_eq!(bucket.remove(&contact(2).id), Some(contact(2)));
        assert!(!bucket.contains(&contact(2).id));
        assert_eq!(bucket.len(), 1);
    }
}
