pub mod app_config;
pub mod database;
pub mod pg_repo;
pub mod redis_repo;

pub use database::DbClient;
pub use pg_repo::PgLockStore;
pub use redis_repo::RedisLockStore;

use std::sync::Arc;
use cinelock_core::{LockStore, MemoryLockStore};
use app_config::{StoreBackend, StoreConfig};

/// Build the configured lock store backend.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn LockStore>, Box<dyn std::error::Error + Send + Sync>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory lock store; holds are lost on restart and not shared between instances");
            Ok(Arc::new(MemoryLockStore::new()))
        }
        StoreBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or("store.redis_url is required for the redis backend")?;
            let store = RedisLockStore::new(url, &config.key_prefix).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or("store.database_url is required for the postgres backend")?;
            let db = DbClient::new(url).await?;
            db.migrate().await?;
            Ok(Arc::new(PgLockStore::new(db.pool)))
        }
    }
}
