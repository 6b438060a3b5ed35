//! `SearchConfig`: ambient configuration, the tunables not carried per-call
//! in `SearchOptions`/`ExactSearchOptions`.

use std::time::Duration;

/// Mirrors the teacher's `OrchestratorConfig` shape (plain struct, `Default`
/// impl, no config-file parsing layer of its own — callers build one from
/// whatever configuration source their deployment uses).
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Dimensionality the embedding provider is expected to produce.
    pub embedding_dimensions: usize,
    /// Debounce window for `ChangeSource` (spec: 500ms).
    pub debounce_interval: Duration,
    /// Default timeout for a structural pattern search (spec: 30s).
    pub pattern_search_timeout: Duration,
    /// Default `SearchOptions.limit` / `ExactSearchOptions.limit` when the
    /// caller doesn't specify one.
    pub default_limit: usize,
    /// Upper clamp for `limit` across both query kinds.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            embedding_dimensions: 384,
            debounce_interval: Duration::from_millis(500),
            pattern_search_timeout: Duration::from_secs(30),
            default_limit: 15,
            max_limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_spec_constants() {
        let config = SearchConfig::default();
        assert_eq!(config.debounce_interval, Duration::from_millis(500));
        assert_eq!(config.pattern_search_timeout, Duration::from_secs(30));
        assert_eq!(config.default_limit, 15);
        assert_eq!(config.max_limit, 100);
    }
}
