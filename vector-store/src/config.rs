use crate::backend::Endpoint;
use crate::backend::IndexParams;
use crate::backend::SearchParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`VectorBackendClient`](crate::VectorBackendClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorClientConfig {
    /// Endpoints in failover order
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<Endpoint>,

    /// Connection alias registered with the backend
    #[serde(default = "default_alias")]
    pub alias: String,

    /// Connection attempts per endpoint before moving to the next one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts; attempt `n` waits `n * retry_delay_ms`
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Timeout for a single connection attempt
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Rows per insert batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Search cache capacity (0 disables the cache)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Number of leading query-vector components hashed into cache keys
    #[serde(default = "default_cache_vector_prefix")]
    pub cache_vector_prefix: usize,

    /// Index built for newly created collections
    #[serde(default)]
    pub index: IndexParams,

    /// IVF clusters probed per search
    #[serde(default = "default_nprobe")]
    pub nprobe: u32,
}

fn default_endpoints() -> Vec<Endpoint> {
    vec![Endpoint::new("localhost", 19530)]
}

fn default_alias() -> String {
    "default".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_batch_size() -> usize {
    1000
}

fn default_cache_size() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_vector_prefix() -> usize {
    10
}

fn default_nprobe() -> u32 {
    10
}

impl Default for VectorClientConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            alias: default_alias(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            batch_size: default_batch_size(),
            cache_size: default_cache_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_vector_prefix: default_cache_vector_prefix(),
            index: IndexParams::default(),
            nprobe: default_nprobe(),
        }
    }
}

impl VectorClientConfig {
    /// Config pointing at the given endpoints, defaults otherwise.
    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            metric: self.index.metric,
            nprobe: self.nprobe,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoints.is_empty() {
            return Err("at least one endpoint must be configured".to_string());
        }

        if let Some(endpoint) = self.endpoints.iter().find(|e| e.host.trim().is_empty()) {
            return Err(format!("endpoint host must not be empty (port {})", endpoint.port));
        }

        if self.alias.trim().is_empty() {
            return Err("alias must not be empty".to_string());
        }

        if self.max_retries == 0 {
            return Err("max_retries must be > 0".to_string());
        }

        if self.connect_timeout_secs == 0 {
            return Err("connect_timeout_secs must be > 0".to_string());
        }

        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }

        if self.index.nlist == 0 {
            return Err("index.nlist must be > 0".to_string());
        }

        if self.nprobe == 0 || self.nprobe > self.index.nlist {
            return Err(format!(
                "nprobe must be in [1, {}], got {}",
                self.index.nlist, self.nprobe
            ));
        }

        Ok(())
    }
}
