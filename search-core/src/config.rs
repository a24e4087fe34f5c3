//! Tunable constants, each exposed with a literal [`Default`] and an
//! environment-variable override reader, following the
//! `read-env-var-or-default` convention used throughout this workspace.

use std::env;
use std::time::Duration;

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|value| value.parse().ok()).unwrap_or(default)
}

/// Reciprocal-rank-fusion tuning.
#[derive(Debug, Clone, Copy)]
pub struct RrfConfig {
    pub k: f64,
    pub min_score: Option<f64>,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: 60.0, min_score: None }
    }
}

impl RrfConfig {
    pub fn from_env() -> Self {
        Self { k: env_parsed("SEARCH_RRF_K", 60.0), min_score: env::var("SEARCH_RRF_MIN_SCORE").ok().and_then(|v| v.parse().ok()) }
    }
}

/// Reindex-lock staleness and heartbeat tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReindexConfig {
    pub stale_lock_absolute: Duration,
    pub stale_lock_idle: Duration,
    pub heartbeat_interval: Duration,
    pub direct_page_size: usize,
    pub max_pages: usize,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            stale_lock_absolute: Duration::from_secs(30 * 60),
            stale_lock_idle: Duration::from_secs(2 * 60),
            heartbeat_interval: Duration::from_secs(30),
            direct_page_size: 200,
            max_pages: 10_000,
        }
    }
}

impl ReindexConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stale_lock_absolute: Duration::from_secs(env_parsed("SEARCH_REINDEX_STALE_ABSOLUTE_SECS", defaults.stale_lock_absolute.as_secs())),
            stale_lock_idle: Duration::from_secs(env_parsed("SEARCH_REINDEX_STALE_IDLE_SECS", defaults.stale_lock_idle.as_secs())),
            heartbeat_interval: Duration::from_secs(env_parsed("SEARCH_REINDEX_HEARTBEAT_SECS", defaults.heartbeat_interval.as_secs())),
            direct_page_size: env_parsed("SEARCH_REINDEX_PAGE_SIZE", defaults.direct_page_size),
            max_pages: env_parsed("SEARCH_REINDEX_MAX_PAGES", defaults.max_pages),
        }
    }
}

/// Presenter-enrichment tuning.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentConfig {
    pub chunk_size: usize,
    pub dek_cache_ttl: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { chunk_size: 500, dek_cache_ttl: Duration::from_secs(5 * 60) }
    }
}

impl EnrichmentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_size: env_parsed("SEARCH_ENRICHMENT_CHUNK_SIZE", defaults.chunk_size),
            dek_cache_ttl: Duration::from_secs(env_parsed("SEARCH_ENRICHMENT_DEK_TTL_SECS", defaults.dek_cache_ttl.as_secs())),
        }
    }
}

/// Full-text driver typo-tolerance and naming tuning.
#[derive(Debug, Clone)]
pub struct FulltextConfig {
    pub index_prefix: String,
    pub typo_tolerance_one: usize,
    pub typo_tolerance_two: usize,
}

impl Default for FulltextConfig {
    fn default() -> Self {
        Self { index_prefix: "search".to_string(), typo_tolerance_one: 4, typo_tolerance_two: 8 }
    }
}

impl FulltextConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            index_prefix: env::var("SEARCH_FULLTEXT_INDEX_PREFIX").unwrap_or(defaults.index_prefix),
            typo_tolerance_one: env_parsed("SEARCH_FULLTEXT_TYPO_ONE", defaults.typo_tolerance_one),
            typo_tolerance_two: env_parsed("SEARCH_FULLTEXT_TYPO_TWO", defaults.typo_tolerance_two),
        }
    }
}

/// Root runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct SearchRuntimeConfig {
    pub rrf: RrfConfig,
    pub reindex: ReindexConfig,
    pub enrichment: EnrichmentConfig,
    pub fulltext: FulltextConfig,
    pub disable_vector_autoindexing: bool,
    pub exclude_encrypted_fields: bool,
}

impl Default for SearchRuntimeConfig {
    fn default() -> Self {
        Self {
            rrf: RrfConfig::default(),
            reindex: ReindexConfig::default(),
            enrichment: EnrichmentConfig::default(),
            fulltext: FulltextConfig::default(),
            disable_vector_autoindexing: false,
            exclude_encrypted_fields: false,
        }
    }
}

impl SearchRuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            rrf: RrfConfig::from_env(),
            reindex: ReindexConfig::from_env(),
            enrichment: EnrichmentConfig::from_env(),
            fulltext: FulltextConfig::from_env(),
            disable_vector_autoindexing: env_parsed("DISABLE_VECTOR_SEARCH_AUTOINDEXING", false),
            exclude_encrypted_fields: env_parsed("SEARCH_EXCLUDE_ENCRYPTED_FIELDS", false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let cfg = ReindexConfig::default();
        assert_eq!(cfg.stale_lock_absolute, Duration::from_secs(1800));
        assert_eq!(cfg.stale_lock_idle, Duration::from_secs(120));
        assert_eq!(cfg.max_pages, 10_000);
        assert_eq!(RrfConfig::default().k, 60.0);
    }
}
