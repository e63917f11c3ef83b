// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod navigation;
pub mod portal;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use config::Config;
use db::store::Stores;
use services::provisioning::ProvisioningQueue;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub config: Arc<Config>,
    /// Rate limiting is skipped when Redis is not configured.
    pub redis: Option<redis::aio::MultiplexedConnection>,
    pub provisioning: ProvisioningQueue,
}
