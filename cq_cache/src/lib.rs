//! The plan cache: keyed by the canonical fingerprint of a logical plan
//! (plus a stable schema identifier, so two plans built against different
//! schemas never collide), returning the previously optimized plan on a
//! hit.
//!
//! Sharded the way `re_data_store::sharded_store::ShardedDataStore` shards
//! its row storage: a fixed number of `parking_lot::Mutex`-guarded shards,
//! the key's hash selecting which one a lookup lands in, so concurrent
//! `get`/`insert` calls against different shards never contend.

use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use cq_plan::LogicalPlan;
use cq_schema::Schema;
use parking_lot::Mutex;

/// Number of independent shards the cache is split across. Fixed rather
/// than configurable: the entry capacity (`EngineConfig::plan_cache_capacity`)
/// is the knob callers actually reason about; shard count is an
/// implementation-internal concurrency/contention tradeoff.
const NUM_SHARDS: usize = 16;

/// Identifies a cached plan: the incoming (pre-optimization) plan's
/// canonical fingerprint, plus a hash of the schema it was built against --
/// two structurally identical plans over different schemas must never
/// collide in the cache, even though `LogicalPlan::fingerprint` alone
/// doesn't encode schema identity beyond what's already baked into `Scan`'s
/// `canonical_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanCacheKey {
    schema_id: u64,
    fingerprint: u64,
}

impl PlanCacheKey {
    pub fn new(schema: &Schema, plan: &LogicalPlan) -> Self {
        Self {
            schema_id: schema_fingerprint(schema),
            fingerprint: plan.fingerprint(),
        }
    }

    fn shard_index(&self) -> usize {
        let mut hasher = ahash::AHasher::default();
        self.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }
}

/// A stable identifier for a schema's shape: the same field names, types,
/// nullability, and order always hash to the same value, independent of
/// which `Arc<Schema>` instance produced it.
pub fn schema_fingerprint(schema: &Schema) -> u64 {
    let mut hasher = ahash::AHasher::default();
    schema.to_string().hash(&mut hasher);
    hasher.finish()
}

struct ShardState {
    entries: HashMap<PlanCacheKey, LogicalPlan, ahash::RandomState>,
    /// Recency order, most-recently-touched at the back. May contain stale
    /// keys already removed from `entries` (lazily skipped on eviction) --
    /// the "approximate" in "approximate LRU".
    recency: VecDeque<PlanCacheKey>,
    capacity: usize,
}

impl ShardState {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_hasher(ahash::RandomState::new()),
            recency: VecDeque::new(),
            capacity,
        }
    }

    fn touch(&mut self, key: PlanCacheKey) {
        self.recency.push_back(key);
    }

    fn evict_if_over_capacity(&mut self) -> u64 {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let Some(candidate) = self.recency.pop_front() else {
                break;
            };
            if self.entries.remove(&candidate).is_some() {
                evicted += 1;
            }
        }
        evicted
    }
}

/// Point-in-time hit/miss/eviction/entry counters, updated atomically as
/// the cache is used.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: u64,
}

/// A fingerprint-keyed, sharded, approximately-LRU cache of optimized
/// logical plans.
///
/// Thread-safe for concurrent `get`/`insert`: each shard is independently
/// locked, and the statistics counters are plain atomics updated outside
/// any lock. A cache entry is immutable once inserted; `insert` on an
/// already-present key is a no-op (matching "inserting when the key
/// already exists is a no-op").
pub struct PlanCache {
    shards: Vec<Mutex<ShardState>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PlanCache {
    /// `capacity` is the total entry budget across every shard (the
    /// `plan_cache_capacity` engine option); each shard gets an even share,
    /// rounded up so the cache never holds fewer entries than requested.
    pub fn new(capacity: usize) -> Self {
        let per_shard = capacity.div_ceil(NUM_SHARDS).max(1);
        let shards = (0..NUM_SHARDS).map(|_| Mutex::new(ShardState::new(per_shard))).collect();
        Self {
            shards,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn shard(&self, key: &PlanCacheKey) -> &Mutex<ShardState> {
        &self.shards[key.shard_index()]
    }

    /// Returns a clone of the cached plan on a hit, bumping it to
    /// most-recently-used. `None` on a miss; the caller is expected to
    /// optimize the plan and call `insert`.
    pub fn get(&self, key: PlanCacheKey) -> Option<LogicalPlan> {
        let mut shard = self.shard(&key).lock();
        let found = shard.entries.get(&key).cloned();
        if let Some(plan) = &found {
            shard.touch(key);
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(plan.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Inserts `plan` under `key` if absent. A no-op if the key is already
    /// present -- the cache never overwrites an existing, immutable entry.
    pub fn insert(&self, key: PlanCacheKey, plan: LogicalPlan) {
        let mut shard = self.shard(&key).lock();
        if shard.entries.contains_key(&key) {
            return;
        }
        shard.entries.insert(key, plan);
        shard.touch(key);
        let evicted = shard.evict_if_over_capacity();
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entry_count: u64 = self.shards.iter().map(|s| s.lock().entries.len() as u64).sum();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count,
        }
    }

    /// Drops every cached entry without resetting the hit/miss/eviction
    /// counters (those describe the cache's lifetime history, not its
    /// current contents).
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut shard = shard.lock();
            shard.entries.clear();
            shard.recency.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cq_predicate::{ComparisonOp, Predicate};
    use cq_schema::{FieldSpec, LogicalType, Scalar};

    use super::*;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new([FieldSpec::new("age", LogicalType::Int32, false)]).unwrap())
    }

    fn scan_plan(schema: &Arc<Schema>) -> LogicalPlan {
        LogicalPlan::Scan {
            table_ref: "t".into(),
            schema: Arc::clone(schema),
            estimated_rows: 10,
        }
    }

    #[test]
    fn miss_then_hit() {
        let cache = PlanCache::new(100);
        let schema = schema();
        let plan = scan_plan(&schema);
        let key = PlanCacheKey::new(&schema, &plan);

        assert!(cache.get(key).is_none());
        cache.insert(key, plan.clone());
        let hit = cache.get(key).unwrap();
        assert_eq!(hit.canonical_text(), plan.canonical_text());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn insert_on_existing_key_is_a_noop() {
        let cache = PlanCache::new(100);
        let schema = schema();
        let plan_a = LogicalPlan::Filter {
            child: Box::new(scan_plan(&schema)),
            predicates: vec![Predicate::Compare { column: 0, op: ComparisonOp::Gt, operand: Scalar::Int32(1) }],
            fuseable: false,
            estimated_rows: 5,
        };
        let plan_b = LogicalPlan::Filter {
            child: Box::new(scan_plan(&schema)),
            predicates: vec![Predicate::Compare { column: 0, op: ComparisonOp::Gt, operand: Scalar::Int32(1) }],
            fuseable: false,
            estimated_rows: 999, // different estimate, same fingerprint input
        };
        let key = PlanCacheKey::new(&schema, &plan_a);
        cache.insert(key, plan_a.clone());
        cache.insert(key, plan_b);
        let cached = cache.get(key).unwrap();
        assert_eq!(cached.canonical_text(), plan_a.canonical_text());
    }

    #[test]
    fn different_schemas_never_collide_even_with_equal_fingerprints() {
        let schema_a = Arc::new(Schema::new([FieldSpec::new("age", LogicalType::Int32, false)]).unwrap());
        let schema_b = Arc::new(Schema::new([FieldSpec::new("age", LogicalType::Int64, false)]).unwrap());
        let cache = PlanCache::new(100);

        let plan_a = scan_plan(&schema_a);
        let plan_b = LogicalPlan::Scan {
            table_ref: "t".into(),
            schema: Arc::clone(&schema_b),
            estimated_rows: 10,
        };
        let key_a = PlanCacheKey::new(&schema_a, &plan_a);
        let key_b = PlanCacheKey::new(&schema_b, &plan_b);
        assert_ne!(key_a, key_b);

        cache.insert(key_a, plan_a);
        assert!(cache.get(key_b).is_none());
    }

    #[test]
    fn eviction_drops_the_least_recently_touched_entry() {
        let cache = PlanCache::new(NUM_SHARDS); // 1 entry per shard
        let schema = schema();

        // Build enough distinct plans that at least one shard receives two
        // entries, forcing an eviction there.
        let mut keys = Vec::new();
        for i in 0..(NUM_SHARDS * 4) {
            let plan = LogicalPlan::Limit { child: Box::new(scan_plan(&schema)), n: i as u64, estimated_rows: i as u64 };
            let key = PlanCacheKey::new(&schema, &plan);
            cache.insert(key, plan);
            keys.push(key);
        }

        let stats = cache.stats();
        assert!(stats.entry_count <= (NUM_SHARDS * 4) as u64);
        assert!(stats.evictions > 0, "expected at least one shard to evict once oversubscribed");
    }
}
