//! Cache configuration

use std::time::Duration;

/// Configuration for the local track cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the cache is used at all (default: true)
    pub enabled: bool,

    /// Entries older than this are evicted (default: 7 days)
    pub max_age: Duration,

    /// Number of blobs kept in memory; 0 disables the memory layer (default: 4)
    pub memory_capacity: usize,

    /// Key prefix separating this cache from other users of the same store
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            memory_capacity: 4,
            namespace: "tracks".to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the cache.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the entry lifetime.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set how many blobs stay in memory.
    pub fn with_memory_capacity(mut self, entries: usize) -> Self {
        self.memory_capacity = entries;
        self
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_age.is_zero() {
            return Err("max_age must be greater than 0".to_string());
        }

        if self.namespace.is_empty() {
            return Err("namespace cannot be empty".to_string());
        }

        if self.namespace.contains('/') {
            return Err("namespace cannot contain '/'".to_string());
        }

        Ok(())
    }
}
