use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::RwLock;

const SHARDS: usize = 64;

/// Concurrent memo of field comparison outcomes, keyed by a 64 bit digest of the ordered pair
/// of compared fields.
///
/// Distinct pairs that share a digest are not told apart. With a 64 bit SipHash digest this
/// is accepted as negligible. Only non-equal outcomes are stored. Once `capacity` entries are
/// stored new outcomes are no longer recorded, lookups keep working.
pub(crate) struct ComparisonCache {
    shards: Vec<RwLock<HashMap<u64, Ordering>>>,
    len: AtomicUsize,
    capacity: usize,
}

impl ComparisonCache {
    pub(crate) fn new(capacity: usize) -> ComparisonCache {
        let shards = (0..SHARDS).map(|_| RwLock::new(HashMap::new())).collect();
        ComparisonCache {
            shards,
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    pub(crate) fn digest(a: &str, b: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        a.hash(&mut hasher);
        b.hash(&mut hasher);
        hasher.finish()
    }

    fn shard(&self, digest: u64) -> &RwLock<HashMap<u64, Ordering>> {
        &self.shards[(digest % SHARDS as u64) as usize]
    }

    pub(crate) fn get(&self, digest: u64) -> Option<Ordering> {
        // a poisoned shard only means a worker panicked mid insert, the map itself is intact
        let shard = match self.shard(digest).read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        shard.get(&digest).copied()
    }

    /// Store `ordering` for `digest` unless an entry is already present. Losing a race with
    /// another writer is harmless, both computed the same outcome.
    pub(crate) fn insert(&self, digest: u64, ordering: Ordering) {
        if ordering == Ordering::Equal || self.len.load(AtomicOrdering::Relaxed) >= self.capacity {
            return;
        }
        let mut shard = match self.shard(digest).write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let std::collections::hash_map::Entry::Vacant(entry) = shard.entry(digest) {
            entry.insert(ordering);
            self.len.fetch_add(1, AtomicOrdering::Relaxed);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(AtomicOrdering::Relaxed)
    }
}
