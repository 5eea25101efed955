use std::sync::Arc;

use anyhow::Result;

use academy_common::EnvVars;
use academy_database::DatabaseEnv;
use academy_runtime::{
    connect, Catalog, DrawConfig, DrawService, HistoryStore, LocalExporter, MemoryStore,
    ProgressLedger, RuntimeEnv, SqliteStore,
};

/// `DATABASE_URL` value that keeps everything in process memory.
pub const MEMORY_DATABASE: &str = "memory";

#[derive(Clone)]
pub struct GlobalState {
    pub draw_service: Arc<DrawService>,
}

impl GlobalState {
    pub fn from_service(draw_service: DrawService) -> Self {
        Self { draw_service: Arc::new(draw_service) }
    }

    /// Loads the catalog and draw config, then opens the configured store.
    pub async fn new() -> Result<Self> {
        let env = RuntimeEnv::load();

        let catalog = Catalog::load(&env.catalog_path)?;
        tracing::info!(
            "[GlobalState::new] loaded {} cards in pools {:?} from {}",
            catalog.len(),
            catalog.pool_tags(),
            env.catalog_path
        );

        let config = if env.draw_config_path.is_empty() {
            DrawConfig::weighted()
        } else {
            DrawConfig::load_json(&env.draw_config_path)?
        };

        let (history, ledger) =
            if DatabaseEnv::load().database_url == MEMORY_DATABASE {
                tracing::warn!("[GlobalState::new] using the in-memory store; draws are lost on restart");
                let store = Arc::new(MemoryStore::new());
                let history: Arc<dyn HistoryStore> = store.clone();
                let ledger: Arc<dyn ProgressLedger> = store;
                (history, ledger)
            } else {
                let pool = connect(false, true).await?.clone();
                let store = Arc::new(SqliteStore::new(pool));
                let history: Arc<dyn HistoryStore> = store.clone();
                let ledger: Arc<dyn ProgressLedger> = store;
                (history, ledger)
            };

        let draw_service = DrawService::new(Arc::new(catalog), config, history, ledger)?
            .with_exporter(LocalExporter::new(&env.export_dir));

        Ok(Self::from_service(draw_service))
    }
}
