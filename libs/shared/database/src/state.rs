use std::sync::Arc;
use tracing::info;

use shared_config::{AppConfig, StoreBackend};

use crate::memory::MemoryStore;
use crate::postgrest::SupabaseStore;
use crate::store::SchedulingStore;

/// Shared router state: configuration plus the scheduling store every cell works against.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn SchedulingStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn SchedulingStore> = match config.store_backend {
            StoreBackend::Memory => {
                info!("Using in-memory scheduling store (single instance only)");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Supabase => {
                info!("Using Supabase scheduling store at {}", config.supabase_url);
                Arc::new(SupabaseStore::new(&config))
            }
        };

        Self::new(config, store)
    }
}
