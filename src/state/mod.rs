use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use sea_orm::DatabaseConnection;

use crate::config::{ApiConfig, CacheConfig};
use crate::engine::SpinEngine;
use crate::models::campaign::LiveCampaign;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub engine: SpinEngine,
    pub cache: Arc<ApiCache>,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        database: DatabaseConnection,
        engine: SpinEngine,
        cache: Arc<ApiCache>,
        config: Arc<ApiConfig>,
    ) -> Self {
        assert!(
            cache.campaign_capacity >= 1,
            "Campaign cache capacity must be configured"
        );
        Self {
            database,
            engine,
            cache,
            config,
            start_time: Instant::now(),
        }
    }
}

/// Read-through cache for the public campaign view. Display data only: cap
/// and uniqueness decisions always go to the ledger.
pub struct ApiCache {
    pub live_campaign: Cache<String, Arc<LiveCampaign>>,
    pub campaign_capacity: u64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.campaign_max_capacity >= 1,
            "Campaign cache capacity threshold"
        );

        let live_campaign = Cache::builder()
            .max_capacity(config.campaign_max_capacity)
            .time_to_live(Duration::from_secs(config.campaign_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.campaign_ttl_seconds / 2 + 1))
            .build();

        Self {
            live_campaign,
            campaign_capacity: config.campaign_max_capacity,
        }
    }
}
