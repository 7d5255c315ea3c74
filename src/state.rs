use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    rbac::cache::PermissionCache,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub permissions: PermissionCache,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(orm: OrmConn, config: AppConfig) -> Self {
        // The raw pool shares connections with the ORM; it backs the
        // hand-written queries (permission resolution, audit inserts).
        let pool = orm.get_postgres_connection_pool().clone();
        Self {
            pool,
            orm,
            permissions: PermissionCache::new(config.permission_cache_ttl),
            config: Arc::new(config),
        }
    }
}
