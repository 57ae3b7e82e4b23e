use async_trait::async_trait;
use log::{debug, info, warn};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio::time::{Duration, sleep, timeout};

use crate::core::Config;
use crate::utils::{DhtError, Result};

use super::api::{ClientApi, NodeApi};
use super::contact::{Contact, ContactCandidates};
use super::node_id::NodeId;
use super::routing_table::RoutingTable;
use super::rpc::RpcType;

/// Local DHT participant: routing table, value store and lookup logic
pub struct DhtNode {
    id: NodeId,
    me: Contact,
    config: Config,
    routing_table: Mutex<RoutingTable>,
    storage: RwLock<HashMap<String, Vec<u8>>>,
    client: OnceLock<Arc<dyn ClientApi>>,
}

impl DhtNode {
    /// Create a node for `config`. The bootstrap node takes the all-zero
    /// id; a peer draws a random id and seeds its table with the
    /// bootstrap contact.
    pub fn new(config: Config) -> Self {
        let id = if config.bootstrap {
            NodeId::zero()
        } else {
            NodeId::random()
        };
        Self::with_id(id, config)
    }

    pub fn with_id(id: NodeId, config: Config) -> Self {
        let me = Contact::new(id, config.address.clone());
        let mut routing_table = RoutingTable::new(me.clone());

        if !config.bootstrap {
            if let Some(address) = &config.bootstrap_address {
                let bootstrap = Contact::new(NodeId::zero(), address.clone());
                info!("Bootstrap contact added: {}", bootstrap);
                routing_table.add_contact(bootstrap);
            }
        }

        info!("DHT node created: {}", me);

        Self {
            id,
            me,
            config,
            routing_table: Mutex::new(routing_table),
            storage: RwLock::new(HashMap::new()),
            client: OnceLock::new(),
        }
    }

    /// Attach the RPC client. Can only be done once.
    pub fn set_client(&self, client: Arc<dyn ClientApi>) -> Result<()> {
        self.client
            .set(client)
            .map_err(|_| DhtError::ConfigError("client already attached".to_string()))
    }

    fn client(&self) -> Option<Arc<dyn ClientApi>> {
        self.client.get().cloned()
    }

    /// Get node ID
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn is_bootstrap(&self) -> bool {
        self.id.is_zero()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get contact count
    pub async fn contact_count(&self) -> usize {
        self.routing_table.lock().await.len()
    }

    /// Run `f` against the routing table under the node lock
    pub async fn with_routing_table<R>(&self, f: impl FnOnce(&RoutingTable) -> R) -> R {
        let table = self.routing_table.lock().await;
        f(&table)
    }

    pub async fn knows(&self, id: &NodeId) -> bool {
        self.with_routing_table(|table| table.bucket(table.bucket_index(id)).contains(id))
            .await
    }

    /// Join the overlay through the bootstrap node
    ///
    /// Pings the bootstrap contact with bounded retries, then looks up
    /// the node's own id to populate the table with nearby peers. A
    /// failed ping is logged and the lookup still runs.
    pub async fn join_network(&self) -> Result<()> {
        if self.is_bootstrap() {
            info!("Bootstrap node, skipping join");
            return Ok(());
        }

        let address = self.config.bootstrap_address.clone().ok_or_else(|| {
            DhtError::ConfigError("a peer node needs a bootstrap address".to_string())
        })?;
        let client = self
            .client()
            .ok_or_else(|| DhtError::ConfigError("no client attached".to_string()))?;

        sleep(random_delay(self.config.join_jitter_ms)).await;

        let bootstrap = Contact::new(NodeId::zero(), address);
        let retries = self.config.bootstrap_retries;
        for attempt in 1..=retries {
            match client.send_ping_message(&bootstrap).await {
                Ok(_) => {
                    debug!("Bootstrap {} answered on attempt {}", bootstrap, attempt);
                    break;
                }
                Err(e) if attempt == retries => {
                    warn!("Failed to ping bootstrap node after {} attempts: {}", retries, e);
                }
                Err(e) => {
                    debug!("Bootstrap ping attempt {} failed: {}", attempt, e);
                    sleep(random_delay(self.config.bootstrap_backoff_ms)).await;
                }
            }
        }

        let nearby = self.iterative_find_node(self.id).await?;
        info!(
            "Joined network: {} nearby contacts, {} known",
            nearby.len(),
            self.contact_count().await
        );
        Ok(())
    }

    /// Routing table as text, one line per contact
    pub async fn routing_table_dump(&self) -> String {
        let table = self.routing_table.lock().await;
        let mut out = format!("Routing table of {} ({} contacts)\n", table.me(), table.len());
        for (index, bucket) in table.occupied_buckets() {
            for contact in bucket.iter() {
                let _ = writeln!(out, "  bucket {:3}: {}", index, contact);
            }
        }
        out
    }

    /// Local store as text, one line per key
    pub async fn store_dump(&self) -> String {
        let storage = self.storage.read().await;
        let mut keys: Vec<&String> = storage.keys().collect();
        keys.sort();

        let mut out = format!("Store of {} ({} keys)\n", self.me, storage.len());
        for key in keys {
            let _ = writeln!(out, "  {} -> {}", key, String::from_utf8_lossy(&storage[key]));
        }
        out
    }
}

#[async_trait]
impl NodeApi for DhtNode {
    fn self_contact(&self) -> Contact {
        self.me.clone()
    }

    /// Admission policy
    ///
    /// Known contacts are refreshed and free slots are filled directly.
    /// For a full bucket the least recently seen entry is pinged with the
    /// lock released; it keeps its slot if it answers, otherwise it is
    /// evicted in favour of `contact`. Bucket state is re-read after the
    /// ping since other tasks may have changed it meanwhile.
    async fn add_contact(&self, contact: Contact) {
        if contact.id == self.id {
            return;
        }

        let tail = {
            let mut table = self.routing_table.lock().await;
            let index = table.bucket_index(&contact.id);
            let bucket = table.bucket_mut(index);
            if bucket.contains(&contact.id) || bucket.len() < self.config.k {
                debug!("Adding {} to bucket {}", contact, index);
                bucket.add_contact(contact);
                return;
            }
            match bucket.back() {
                Some(tail) => tail.clone(),
                None => return,
            }
        };

        let Some(client) = self.client() else {
            debug!("Bucket full and no client attached, discarding {}", contact);
            return;
        };

        let alive = matches!(
            client.send_ping_message(&tail).await,
            Ok(reply) if reply.msg_type == RpcType::Pong
        );

        let mut table = self.routing_table.lock().await;
        let index = table.bucket_index(&contact.id);
        let bucket = table.bucket_mut(index);

        if alive {
            bucket.refresh(&tail.id);
            debug!("{} responded to ping, discarding {}", tail, contact);
        } else if bucket.contains(&contact.id) {
            bucket.refresh(&contact.id);
        } else if bucket.remove(&tail.id).is_some() || bucket.len() < self.config.k {
            info!("{} did not respond, replaced with {}", tail, contact);
            bucket.add_contact(contact);
        } else {
            debug!("Bucket {} refilled concurrently, discarding {}", index, contact);
        }
    }

    async fn lookup_closest_contacts(&self, target: &NodeId) -> Vec<Contact> {
        self.routing_table
            .lock()
            .await
            .find_closest_contacts(target, self.config.alpha)
    }

    /// Iterative FIND_NODE
    ///
    /// Each round queries up to `alpha` not yet queried shortlist entries
    /// in parallel and merges what they return. The lookup ends when a
    /// round discovers nothing new or every entry has been queried, so it
    /// runs at most once per distinct contact discovered.
    async fn iterative_find_node(&self, target: NodeId) -> Result<Vec<Contact>> {
        let alpha = self.config.alpha;
        let mut shortlist = self.lookup_closest_contacts(&target).await;
        if shortlist.is_empty() {
            return Ok(shortlist);
        }

        let Some(client) = self.client() else {
            shortlist.truncate(self.config.lookup_width);
            return Ok(shortlist);
        };

        let mut queried: HashSet<NodeId> = HashSet::new();
        let mut in_shortlist: HashSet<NodeId> = shortlist.iter().map(|c| c.id).collect();
        in_shortlist.insert(self.id);
        let call_timeout = self.config.lookup_call_timeout();
        let mut round = 0;

        loop {
            let batch: Vec<Contact> = shortlist
                .iter()
                .filter(|c| !queried.contains(&c.id))
                .take(alpha)
                .cloned()
                .collect();
            if batch.is_empty() {
                break;
            }
            round += 1;

            let mut calls = JoinSet::new();
            for contact in batch {
                queried.insert(contact.id);
                let client = client.clone();
                calls.spawn(async move {
                    match timeout(call_timeout, client.send_find_node_message(target, &contact)).await {
                        Ok(Ok(found)) => found,
                        Ok(Err(e)) => {
                            debug!("FIND_NODE to {} failed: {}", contact, e);
                            Vec::new()
                        }
                        Err(_) => {
                            debug!("FIND_NODE to {} timed out", contact);
                            Vec::new()
                        }
                    }
                });
            }

            let mut updated = false;
            while let Some(joined) = calls.join_next().await {
                let found = match joined {
                    Ok(found) => found,
                    Err(e) => {
                        warn!("Lookup task failed: {}", e);
                        continue;
                    }
                };
                for contact in found {
                    if in_shortlist.insert(contact.id) {
                        shortlist.push(contact);
                        updated = true;
                    }
                }
            }

            if !updated {
                break;
            }

            let mut candidates = ContactCandidates::new();
            candidates.append(shortlist, &target);
            candidates.sort();
            shortlist = candidates.into_inner();
        }

        debug!(
            "Lookup for {} finished after {} rounds, {} candidates",
            target,
            round,
            shortlist.len()
        );
        shortlist.truncate(self.config.lookup_width);
        Ok(shortlist)
    }

    async fn lookup_data(&self, key: &str) -> Option<Vec<u8>> {
        self.storage.read().await.get(key).cloned()
    }

    async fn store(&self, key: String, data: Vec<u8>) {
        debug!("Stored {} bytes under {}", data.len(), key);
        self.storage.write().await.insert(key, data);
    }
}

fn random_delay(max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::dht::api::StoreReceipt;
    use crate::network::dht::bucket::Bucket;
    use crate::network::dht::node_id::{ID_BITS, ID_LENGTH};
    use crate::network::dht::rpc::RpcMessage;
    use std::sync::Weak;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every ping and every FIND_NODE with nothing
    #[derive(Default)]
    struct MockClient {
        pings: AtomicUsize,
    }

    #[async_trait]
    impl ClientApi for MockClient {
        async fn send_ping_message(&self, _target: &Contact) -> Result<RpcMessage> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            Ok(RpcMessage::new(RpcType::Pong, Default::default(), false))
        }

        async fn send_find_node_message(&self, _target: NodeId, _contact: &Contact) -> Result<Vec<Contact>> {
            Ok(Vec::new())
        }

        async fn send_store_message(&self, _data: &[u8]) -> Result<StoreReceipt> {
            Err(DhtError::Timeout)
        }

        async fn send_find_value_message(&self, _hash: &str) -> Result<RpcMessage> {
            Err(DhtError::Timeout)
        }
    }

    /// Never answers
    struct MockClientNoRespond;

    #[async_trait]
    impl ClientApi for MockClientNoRespond {
        async fn send_ping_message(&self, _target: &Contact) -> Result<RpcMessage> {
            Err(DhtError::Timeout)
        }

        async fn send_find_node_message(&self, _target: NodeId, _contact: &Contact) -> Result<Vec<Contact>> {
            Err(DhtError::Timeout)
        }

        async fn send_store_message(&self, _data: &[u8]) -> Result<StoreReceipt> {
            Err(DhtError::Timeout)
        }

        async fn send_find_value_message(&self, _hash: &str) -> Result<RpcMessage> {
            Err(DhtError::Timeout)
        }
    }

    /// Answers FIND_NODE from a fixed neighbour map and counts queries
    #[derive(Default)]
    struct GraphClient {
        neighbours: HashMap<NodeId, Vec<Contact>>,
        queries: std::sync::Mutex<Vec<NodeId>>,
    }

    #[async_trait]
    impl ClientApi for GraphClient {
        async fn send_ping_message(&self, _target: &Contact) -> Result<RpcMessage> {
            Ok(RpcMessage::new(RpcType::Pong, Default::default(), false))
        }

        async fn send_find_node_message(&self, _target: NodeId, contact: &Contact) -> Result<Vec<Contact>> {
            self.queries.lock().unwrap().push(contact.id);
            Ok(self.neighbours.get(&contact.id).cloned().unwrap_or_default())
        }

        async fn send_store_message(&self, _data: &[u8]) -> Result<StoreReceipt> {
            Err(DhtError::Timeout)
        }

        async fn send_find_value_message(&self, _hash: &str) -> Result<RpcMessage> {
            Err(DhtError::Timeout)
        }
    }

    type BucketEdit = Box<dyn Fn(&mut Bucket) + Send + Sync>;

    /// Tail never answers; `edit` runs on bucket 154 while the ping is out
    struct RacingClient {
        node: OnceLock<Weak<DhtNode>>,
        edit: BucketEdit,
    }

    impl RacingClient {
        fn attach(node: &Arc<DhtNode>, edit: BucketEdit) {
            let client = Arc::new(Self {
                node: OnceLock::new(),
                edit,
            });
            client.node.set(Arc::downgrade(node)).unwrap();
            node.set_client(client).unwrap();
        }
    }

    #[async_trait]
    impl ClientApi for RacingClient {
        async fn send_ping_message(&self, _target: &Contact) -> Result<RpcMessage> {
            if let Some(node) = self.node.get().and_then(Weak::upgrade) {
                let mut table = node.routing_table.lock().await;
                (self.edit)(table.bucket_mut(154));
            }
            Err(DhtError::Timeout)
        }

        async fn send_find_node_message(&self, _target: NodeId, _contact: &Contact) -> Result<Vec<Contact>> {
            Err(DhtError::Timeout)
        }

        async fn send_store_message(&self, _data: &[u8]) -> Result<StoreReceipt> {
            Err(DhtError::Timeout)
        }

        async fn send_find_value_message(&self, _hash: &str) -> Result<RpcMessage> {
            Err(DhtError::Timeout)
        }
    }

    fn bootstrap_node() -> DhtNode {
        DhtNode::new(Config::for_testing("localhost:8000", None))
    }

    fn id_with_last_byte(b: u8) -> NodeId {
        let mut bytes = [0u8; ID_LENGTH];
        bytes[ID_LENGTH - 1] = b;
        NodeId::new(bytes)
    }

    /// Fill bucket 154 of a zero-id node with 0x28..=0x3b
    async fn fill_bucket_154(node: &DhtNode) -> Vec<Contact> {
        let mut contacts = Vec::new();
        for i in 0..node.config().k as u8 {
            let contact = Contact::new(id_with_last_byte(0x28 + i), format!("1.2.3.4:{}", 8001 + i as u16));
            node.add_contact(contact.clone()).await;
            contacts.push(contact);
        }
        contacts
    }

    #[tokio::test]
    async fn test_new_bootstrap_node() {
        let node = bootstrap_node();
        assert!(node.is_bootstrap());
        assert_eq!(node.self_contact().address, "localhost:8000");
        assert_eq!(node.contact_count().await, 0);
    }

    #[tokio::test]
    async fn test_new_peer_knows_bootstrap() {
        let node = DhtNode::new(Config::for_testing("localhost:8001", Some("localhost:8000".to_string())));
        assert!(!node.is_bootstrap());
        assert_ne!(node.node_id(), NodeId::zero());
        assert!(node.knows(&NodeId::zero()).await);
        assert_eq!(node.contact_count().await, 1);
    }

    #[tokio::test]
    async fn test_set_client_once() {
        let node = bootstrap_node();
        assert!(node.set_client(Arc::new(MockClient::default())).is_ok());
        assert!(node.set_client(Arc::new(MockClient::default())).is_err());
    }

    #[tokio::test]
    async fn test_add_contact_self_is_ignored() {
        let node = bootstrap_node();
        node.add_contact(node.self_contact()).await;
        assert_eq!(node.contact_count().await, 0);
        assert!(node.with_routing_table(|t| t.bucket(ID_BITS - 1).is_empty()).await);
    }

    #[tokio::test]
    async fn test_add_contact_normal_and_duplicate() {
        let node = bootstrap_node();
        let contact = Contact::new(id_with_last_byte(1), "localhost:8001");
        node.add_contact(contact.clone()).await;
        node.add_contact(contact.clone()).await;

        assert!(node.knows(&contact.id).await);
        assert_eq!(node.contact_count().await, 1);
    }

    #[tokio::test]
    async fn test_full_bucket_keeps_responsive_tail() {
        let node = bootstrap_node();
        let client = Arc::new(MockClient::default());
        node.set_client(client.clone()).unwrap();
        let contacts = fill_bucket_154(&node).await;
        assert_eq!(node.with_routing_table(|t| t.bucket(154).len()).await, 20);
        assert_eq!(client.pings.load(Ordering::SeqCst), 0);

        let newcomer = Contact::new(id_with_last_byte(60), "0.0.0.0:9999");
        node.add_contact(newcomer.clone()).await;

        assert_eq!(client.pings.load(Ordering::SeqCst), 1);
        assert!(!node.knows(&newcomer.id).await);
        let (len, front) = node
            .with_routing_table(|t| (t.bucket(154).len(), t.bucket(154).front().cloned()))
            .await;
        assert_eq!(len, 20);
        // the pinged tail was the first contact added; it is now most recent
        assert_eq!(front, Some(contacts[0].clone()));
    }

    #[tokio::test]
    async fn test_full_bucket_evicts_silent_tail() {
        let node = bootstrap_node();
        node.set_client(Arc::new(MockClientNoRespond)).unwrap();
        let contacts = fill_bucket_154(&node).await;

        let newcomer = Contact::new(id_with_last_byte(60), "0.0.0.0:9999");
        node.add_contact(newcomer.clone()).await;

        assert!(node.knows(&newcomer.id).await);
        assert!(!node.knows(&contacts[0].id).await);
        assert_eq!(node.with_routing_table(|t| t.bucket(154).len()).await, 20);
    }

    #[tokio::test]
    async fn test_newcomer_admitted_during_tail_ping_is_kept() {
        let node = Arc::new(bootstrap_node());
        let newcomer = Contact::new(id_with_last_byte(60), "0.0.0.0:9999");
        let concurrent = newcomer.clone();
        RacingClient::attach(
            &node,
            Box::new(move |bucket: &mut Bucket| {
                bucket.remove(&id_with_last_byte(0x29));
                bucket.add_contact(concurrent.clone());
            }),
        );
        let contacts = fill_bucket_154(&node).await;

        node.add_contact(newcomer.clone()).await;

        let (len, front) = node
            .with_routing_table(|t| (t.bucket(154).len(), t.bucket(154).front().cloned()))
            .await;
        assert_eq!(len, 20);
        assert_eq!(front, Some(newcomer));
        // the silent tail survives because no slot was needed
        assert!(node.knows(&contacts[0].id).await);
    }

    #[tokio::test]
    async fn test_bucket_refilled_during_tail_ping_discards_newcomer() {
        let node = Arc::new(bootstrap_node());
        let refill = Contact::new(id_with_last_byte(61), "0.0.0.0:9998");
        let concurrent = refill.clone();
        RacingClient::attach(
            &node,
            Box::new(move |bucket: &mut Bucket| {
                bucket.remove(&id_with_last_byte(0x28));
                bucket.add_contact(concurrent.clone());
            }),
        );
        let contacts = fill_bucket_154(&node).await;

        let newcomer = Contact::new(id_with_last_byte(60), "0.0.0.0:9999");
        node.add_contact(newcomer.clone()).await;

        assert!(!node.knows(&newcomer.id).await);
        assert!(node.knows(&refill.id).await);
        assert!(!node.knows(&contacts[0].id).await);
        assert_eq!(node.with_routing_table(|t| t.bucket(154).len()).await, 20);
    }

    #[tokio::test]
    async fn test_tail_removed_during_ping_frees_slot() {
        let node = Arc::new(bootstrap_node());
        RacingClient::attach(
            &node,
            Box::new(|bucket: &mut Bucket| {
                bucket.remove(&id_with_last_byte(0x28));
            }),
        );
        fill_bucket_154(&node).await;

        let newcomer = Contact::new(id_with_last_byte(60), "0.0.0.0:9999");
        node.add_contact(newcomer.clone()).await;

        assert!(node.knows(&newcomer.id).await);
        assert_eq!(node.with_routing_table(|t| t.bucket(154).len()).await, 20);
    }

    #[tokio::test]
    async fn test_full_bucket_without_client_discards() {
        let node = bootstrap_node();
        fill_bucket_154(&node).await;

        let newcomer = Contact::new(id_with_last_byte(60), "0.0.0.0:9999");
        node.add_contact(newcomer.clone()).await;
        assert!(!node.knows(&newcomer.id).await);
    }

    #[tokio::test]
    async fn test_bucket_never_exceeds_k() {
        let node = bootstrap_node();
        node.set_client(Arc::new(MockClientNoRespond)).unwrap();
        for b in 0x20..=0x3f {
            node.add_contact(Contact::new(id_with_last_byte(b), format!("n{}", b))).await;
        }
        let longest = node
            .with_routing_table(|t| (0..ID_BITS).map(|i| t.bucket(i).len()).max().unwrap_or(0))
            .await;
        assert_eq!(longest, 20);
    }

    #[tokio::test]
    async fn test_lookup_closest_contacts_is_bounded_by_alpha() {
        let node = bootstrap_node();
        for i in 0..5 {
            node.add_contact(Contact::new(NodeId::random(), format!("localhost:{}", 8001 + i)))
                .await;
        }
        let closest = node.lookup_closest_contacts(&NodeId::random()).await;
        assert_eq!(closest.len(), 3);
    }

    #[tokio::test]
    async fn test_iterative_find_node_on_empty_table() {
        let node = bootstrap_node();
        node.set_client(Arc::new(MockClient::default())).unwrap();
        assert!(node.iterative_find_node(NodeId::random()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_iterative_find_node_never_returns_self() {
        let node = bootstrap_node();
        node.set_client(Arc::new(MockClient::default())).unwrap();
        for i in 0..10 {
            node.add_contact(Contact::new(NodeId::random(), format!("localhost:{}", 8001 + i)))
                .await;
        }

        let contacts = node.iterative_find_node(NodeId::random()).await.unwrap();
        assert_eq!(contacts.len(), 3);
        assert!(contacts.iter().all(|c| c.id != node.node_id()));
    }

    #[tokio::test]
    async fn test_iterative_find_node_walks_towards_target() {
        let node = bootstrap_node();
        let me = node.self_contact();
        let far = Contact::new(NodeId::from_hex("8000000000000000000000000000000000000000").unwrap(), "far");
        let mid = Contact::new(NodeId::from_hex("00ff000000000000000000000000000000000000").unwrap(), "mid");
        let near = Contact::new(NodeId::from_hex("00000000000000000000000000000000000000f1").unwrap(), "near");
        let target = NodeId::from_hex("00000000000000000000000000000000000000f0").unwrap();

        let mut client = GraphClient::default();
        client.neighbours.insert(far.id, vec![mid.clone(), me.clone()]);
        client.neighbours.insert(mid.id, vec![near.clone(), far.clone()]);
        client.neighbours.insert(near.id, vec![far.clone(), mid.clone(), me.clone()]);
        let client = Arc::new(client);
        node.set_client(client.clone()).unwrap();
        node.add_contact(far.clone()).await;

        let found = node.iterative_find_node(target).await.unwrap();
        let names: Vec<&str> = found.iter().map(|c| c.address.as_str()).collect();
        assert_eq!(names, vec!["near", "mid", "far"]);

        // every contact queried exactly once
        let mut queries = client.queries.lock().unwrap().clone();
        queries.sort();
        assert_eq!(queries, vec![near.id, mid.id, far.id]);
    }

    #[tokio::test]
    async fn test_lookup_width_widens_result() {
        let mut config = Config::for_testing("localhost:8000", None);
        config.lookup_width = 5;
        let node = DhtNode::new(config);
        let mut client = GraphClient::default();
        let seed = Contact::new(NodeId::random(), "seed");
        let others: Vec<Contact> = (0..6).map(|i| Contact::new(NodeId::random(), format!("n{}", i))).collect();
        client.neighbours.insert(seed.id, others);
        node.set_client(Arc::new(client)).unwrap();
        node.add_contact(seed).await;

        assert_eq!(node.iterative_find_node(NodeId::random()).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_store_and_lookup_data() {
        let node = bootstrap_node();
        node.store("testkey".to_string(), b"testdata".to_vec()).await;

        assert_eq!(node.lookup_data("testkey").await, Some(b"testdata".to_vec()));
        assert_eq!(node.lookup_data("notfound").await, None);
        assert!(node.store_dump().await.contains("testkey -> testdata"));
    }

    #[tokio::test]
    async fn test_join_network_bootstrap_is_noop() {
        let node = bootstrap_node();
        let client = Arc::new(MockClient::default());
        node.set_client(client.clone()).unwrap();
        node.join_network().await.unwrap();
        assert_eq!(client.pings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_join_network_pings_bootstrap() {
        let node = DhtNode::new(Config::for_testing("localhost:8001", Some("localhost:8000".to_string())));
        let client = Arc::new(MockClient::default());
        node.set_client(client.clone()).unwrap();
        node.join_network().await.unwrap();
        assert_eq!(client.pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_join_network_survives_silent_bootstrap() {
        let node = DhtNode::new(Config::for_testing("localhost:8001", Some("localhost:8000".to_string())));
        node.set_client(Arc::new(MockClientNoRespond)).unwrap();
        assert!(node.join_network().await.is_ok());
    }

    #[tokio::test]
    async fn test_routing_table_dump() {
        let node = bootstrap_node();
        node.add_contact(Contact::new(id_with_last_byte(1), "localhost:8001")).await;
        let dump = node.routing_table_dump().await;
        assert!(dump.contains("1 contacts"));
        assert!(dump.contains("bucket 159"));
        assert!(dump.contains("localhost:8001"));
    }
}
