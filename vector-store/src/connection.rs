//! Connection lifecycle for the vector backend.
//!
//! [`ConnectionManager`] owns the process-wide connection state. Health
//! checks run before every client operation; when the probe fails the
//! manager disconnects and walks the configured endpoints round-robin,
//! starting from the current one, retrying each up to `max_retries` times
//! with linearly increasing delay. Concurrent callers that observe the same
//! failure collapse into a single reconnection: the first one takes the
//! reconnect lock, the rest wait on it and then reuse its outcome.

use crate::backend::Endpoint;
use crate::backend::VectorBackend;
use crate::config::VectorClientConfig;
use crate::error::Result;
use crate::error::VectorStoreError;
use chrono::DateTime;
use chrono::Utc;
use log::debug;
use log::info;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The last health check failed; a reconnect is pending or in progress.
    Degraded(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Degraded(reason) => write!(f, "degraded ({reason})"),
        }
    }
}

/// Last time an endpoint answered a connect or probe. Observability only;
/// failover order ignores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointHealth {
    pub endpoint: Endpoint,
    pub last_healthy_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per endpoint
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &VectorClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Delay after the `attempt`-th failure (1-based) on the same endpoint.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

/// Outcome of the most recent failed reconnect, replayed to callers that
/// waited on it.
#[derive(Debug, Clone)]
struct FailedReconnect {
    attempts: u32,
    last_error: String,
}

struct Inner {
    state: ConnectionState,
    current: usize,
    health: Vec<EndpointHealth>,
    last_failure: Option<FailedReconnect>,
}

pub struct ConnectionManager {
    backend: Arc<dyn VectorBackend>,
    endpoints: Vec<Endpoint>,
    alias: String,
    policy: RetryPolicy,
    inner: RwLock<Inner>,
    reconnect: Mutex<()>,
    /// Bumped after every completed reconnect, successful or not.
    generation: AtomicU64,
}

impl ConnectionManager {
    pub fn new(backend: Arc<dyn VectorBackend>, config: &VectorClientConfig) -> Self {
        let health = config
            .endpoints
            .iter()
            .map(|endpoint| EndpointHealth {
                endpoint: endpoint.clone(),
                last_healthy_at: None,
            })
            .collect();
        Self {
            backend,
            endpoints: config.endpoints.clone(),
            alias: config.alias.clone(),
            policy: RetryPolicy::from_config(config),
            inner: RwLock::new(Inner {
                state: ConnectionState::Disconnected,
                current: 0,
                health,
                last_failure: None,
            }),
            reconnect: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state.clone()
    }

    /// Endpoint currently selected for connections.
    pub async fn current_endpoint(&self) -> Option<Endpoint> {
        let inner = self.inner.read().await;
        self.endpoints.get(inner.current).cloned()
    }

    pub async fn endpoint_health(&self) -> Vec<EndpointHealth> {
        self.inner.read().await.health.clone()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Connect unconditionally, failing over across endpoints.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.reconnect.lock().await;
        self.reconnect_locked().await
    }

    /// Probe the current connection and reconnect if the probe fails.
    ///
    /// Returns [`VectorStoreError::Connection`] once every endpoint has been
    /// exhausted; callers should surface it rather than retry.
    pub async fn ensure_connection(&self) -> Result<()> {
        let observed = self.generation.load(Ordering::Acquire);

        let state = self.state().await;
        let reason = if state == ConnectionState::Disconnected {
            "not connected".to_string()
        } else {
            match self.probe().await {
                Ok(()) => return Ok(()),
                Err(err) => err.to_string(),
            }
        };

        let _guard = self.reconnect.lock().await;
        if self.generation.load(Ordering::Acquire) != observed {
            // Another caller reconnected while we waited for the lock.
            let inner = self.inner.read().await;
            return match (&inner.state, &inner.last_failure) {
                (ConnectionState::Connected, _) => Ok(()),
                (_, Some(failure)) => Err(self.connection_error(failure)),
                (_, None) => Err(VectorStoreError::Connection {
                    endpoints: self.endpoints.len(),
                    attempts: 0,
                    last_error: reason,
                }),
            };
        }

        warn!("vector backend health check failed: {reason}");
        if state != ConnectionState::Disconnected {
            self.inner.write().await.state = ConnectionState::Degraded(reason);
            self.backend.disconnect(&self.alias).await;
        }
        self.reconnect_locked().await
    }

    /// Tear down the connection. The next operation reconnects from scratch.
    pub async fn disconnect(&self) {
        let _guard = self.reconnect.lock().await;
        self.backend.disconnect(&self.alias).await;
        self.inner.write().await.state = ConnectionState::Disconnected;
        info!("vector backend connection {} closed", self.alias);
    }

    async fn probe(&self) -> Result<()> {
        let timeout = self.policy.connect_timeout;
        match tokio::time::timeout(timeout, self.backend.list_collections()).await {
            Ok(Ok(_)) => {
                let mut inner = self.inner.write().await;
                let current = inner.current;
                if let Some(health) = inner.health.get_mut(current) {
                    health.last_healthy_at = Some(Utc::now());
                }
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(VectorStoreError::Timeout(timeout)),
        }
    }

    async fn attempt(&self, endpoint: &Endpoint) -> Result<()> {
        let timeout = self.policy.connect_timeout;
        match tokio::time::timeout(
            timeout,
            self.backend.connect(endpoint, &self.alias, timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(VectorStoreError::Timeout(timeout)),
        }
    }

    /// Walk endpoints round-robin from the current one. Caller must hold the
    /// reconnect lock.
    async fn reconnect_locked(&self) -> Result<()> {
        let start = {
            let mut inner = self.inner.write().await;
            inner.state = ConnectionState::Connecting;
            inner.current
        };

        let count = self.endpoints.len();
        let mut attempts = 0u32;
        let mut last_error = String::from("no endpoints configured");

        for offset in 0..count {
            let index = (start + offset) % count;
            let endpoint = &self.endpoints[index];

            for attempt in 1..=self.policy.max_retries {
                attempts += 1;
                debug!(
                    "connecting to {endpoint} (attempt {attempt}/{})",
                    self.policy.max_retries
                );
                match self.attempt(endpoint).await {
                    Ok(()) => {
                        {
                            let mut inner = self.inner.write().await;
                            inner.state = ConnectionState::Connected;
                            inner.current = index;
                            inner.last_failure = None;
                            if let Some(health) = inner.health.get_mut(index) {
                                health.last_healthy_at = Some(Utc::now());
                            }
                        }
                        self.generation.fetch_add(1, Ordering::AcqRel);
                        info!("connected to vector backend at {endpoint} as {}", self.alias);
                        return Ok(());
                    }
                    Err(err) => {
                        warn!("connection to {endpoint} failed (attempt {attempt}): {err}");
                        last_error = err.to_string();
                    }
                }
                if attempt < self.policy.max_retries {
                    tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                }
            }

            if offset + 1 < count {
                warn!("retries exhausted for {endpoint}, failing over");
            }
        }

        let failure = FailedReconnect {
            attempts,
            last_error,
        };
        {
            let mut inner = self.inner.write().await;
            inner.state = ConnectionState::Disconnected;
            inner.last_failure = Some(failure.clone());
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        Err(self.connection_error(&failure))
    }

    fn connection_error(&self, failure: &FailedReconnect) -> VectorStoreError {
        VectorStoreError::Connection {
            endpoints: self.endpoints.len(),
            attempts: failure.attempts,
            last_error: failure.last_error.clone(),
        }
    }
}
