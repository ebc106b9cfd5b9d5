//! Device-type to shard routing.
//!
//! Every device type is served by exactly one store endpoint. The mapping is
//! fixed at startup; traffic for a type without a shard is a configuration
//! error and aborts the file that contains it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PipelineConfig, ShardEndpoints};
use crate::error::ConfigError;
use crate::record::DeviceType;
use crate::store::{KvStore, MemcacheStore, RetryPolicy, StoreClient};

/// Maps device types onto store clients.
#[derive(Clone, Default)]
pub struct ShardRouter {
    shards: HashMap<DeviceType, StoreClient>,
}

impl ShardRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a router with one memcached client per distinct endpoint.
    /// Device types pointing at the same address share the client.
    pub fn memcached(
        endpoints: &ShardEndpoints,
        pipeline: &PipelineConfig,
        socket_timeout: Duration,
    ) -> Self {
        let mut by_addr: HashMap<&str, Arc<dyn KvStore>> = HashMap::new();
        let mut router = Self::new();
        for (device_type, addr) in endpoints.iter() {
            let store = by_addr
                .entry(addr)
                .or_insert_with(|| Arc::new(MemcacheStore::with_timeout(addr, socket_timeout)))
                .clone();
            router.insert(device_type, Self::client_for(store, pipeline));
        }
        router
    }

    /// Wrap `store` with the retry and dry-run settings of `pipeline`.
    pub fn client_for(store: Arc<dyn KvStore>, pipeline: &PipelineConfig) -> StoreClient {
        let policy = RetryPolicy {
            max_attempts: pipeline.retry_count,
            delay: pipeline.retry_delay,
        };
        StoreClient::new(store, policy, pipeline.dry_run)
    }

    pub fn insert(&mut self, device_type: DeviceType, client: StoreClient) {
        self.shards.insert(device_type, client);
    }

    #[must_use]
    pub fn with_shard(mut self, device_type: DeviceType, client: StoreClient) -> Self {
        self.insert(device_type, client);
        self
    }

    /// Client responsible for `device_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingShard`] when no endpoint is configured for it.
    pub fn route(&self, device_type: DeviceType) -> Result<&StoreClient, ConfigError> {
        self.shards
            .get(&device_type)
            .ok_or(ConfigError::MissingShard(device_type))
    }

    /// Endpoint address for `device_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingShard`] when no endpoint is configured for it.
    pub fn endpoint(&self, device_type: DeviceType) -> Result<&str, ConfigError> {
        self.route(device_type).map(StoreClient::addr)
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
