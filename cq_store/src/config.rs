use crate::chunk::DEFAULT_CHUNK_SIZE;

/// Immutable, plain-data engine configuration: threaded by value/reference
/// through the planner and executor, never mutated after construction.
///
/// Mirrors the `DataStoreConfig::DEFAULT` associated-const idiom: a
/// `Default` impl backed by a named constant rather than a derive, so the
/// defaults are visible at the definition site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Row count above which the physical planner prefers a parallel
    /// strategy over sequential scan.
    pub parallel_threshold: usize,
    /// Rows per chunk at ingest time.
    pub chunk_size: usize,
    /// Worker count for the engine's `rayon::ThreadPool`.
    pub max_degree_of_parallelism: usize,
    /// Row count above which `GROUP BY` prefers a parallel partial-aggregate
    /// + merge strategy over a single-threaded hash aggregation.
    pub parallel_group_by_threshold: usize,
    /// Entry capacity of the plan cache (per shard count, see `cq_cache`).
    pub plan_cache_capacity: usize,
    pub enable_zone_maps: bool,
    pub enable_bloom_filters: bool,
    pub enable_simd: bool,
    /// `true`: front-end translator failures surface as `UnsupportedExpression`.
    /// `false`: best-effort fallback to the scalar evaluation path.
    pub strict_mode: bool,
}

impl EngineConfig {
    /// Same defaults as `Self::default()`, exposed as a const so callers can
    /// reference it (and override a subset) without an allocation or a call.
    pub const DEFAULT: Self = Self {
        parallel_threshold: 50_000,
        chunk_size: DEFAULT_CHUNK_SIZE,
        max_degree_of_parallelism: 0, // resolved to the CPU count by `builder()`.
        parallel_group_by_threshold: 100_000,
        plan_cache_capacity: 100,
        enable_zone_maps: true,
        enable_bloom_filters: true,
        enable_simd: true,
        strict_mode: true,
    };

    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::DEFAULT,
        }
    }

    /// Resolved worker count: `max_degree_of_parallelism` if explicitly set,
    /// else the available parallelism reported by the OS (falling back to 1).
    pub fn resolved_degree_of_parallelism(&self) -> usize {
        if self.max_degree_of_parallelism > 0 {
            self.max_degree_of_parallelism
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Ergonomic construction: `EngineConfig::builder().chunk_size(4096).build()`.
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn parallel_threshold(mut self, value: usize) -> Self {
        self.config.parallel_threshold = value;
        self
    }

    pub fn chunk_size(mut self, value: usize) -> Self {
        self.config.chunk_size = value;
        self
    }

    pub fn max_degree_of_parallelism(mut self, value: usize) -> Self {
        self.config.max_degree_of_parallelism = value;
        self
    }

    pub fn parallel_group_by_threshold(mut self, value: usize) -> Self {
        self.config.parallel_group_by_threshold = value;
        self
    }

    pub fn plan_cache_capacity(mut self, value: usize) -> Self {
        self.config.plan_cache_capacity = value;
        self
    }

    pub fn enable_zone_maps(mut self, value: bool) -> Self {
        self.config.enable_zone_maps = value;
        self
    }

    pub fn enable_bloom_filters(mut self, value: bool) -> Self {
        self.config.enable_bloom_filters = value;
        self
    }

    pub fn enable_simd(mut self, value: bool) -> Self {
        self.config.enable_simd = value;
        self
    }

    pub fn strict_mode(mut self, value: bool) -> Self {
        self.config.strict_mode = value;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.parallel_threshold, 50_000);
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.parallel_group_by_threshold, 100_000);
        assert_eq!(cfg.plan_cache_capacity, 100);
        assert!(cfg.enable_zone_maps);
        assert!(cfg.enable_bloom_filters);
        assert!(cfg.enable_simd);
        assert!(cfg.strict_mode);
    }

    #[test]
    fn builder_overrides_only_named_fields() {
        let cfg = EngineConfig::builder().chunk_size(4096).strict_mode(false).build();
        assert_eq!(cfg.chunk_size, 4096);
        assert!(!cfg.strict_mode);
        assert_eq!(cfg.parallel_threshold, EngineConfig::DEFAULT.parallel_threshold);
    }

    #[test]
    fn resolved_degree_of_parallelism_falls_back_to_os_count() {
        let cfg = EngineConfig::default();
        assert!(cfg.resolved_degree_of_parallelism() >= 1);
    }
}
