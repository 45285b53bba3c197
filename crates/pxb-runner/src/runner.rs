use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pxb_anthropic::AnthropicClient;
use pxb_artifacts::FsArtifactWriter;
use pxb_providers::ResourceProvider;
use pxb_proxmox::ProxmoxClient;
use pxb_storage_sqlite::SqliteJobStore;

use crate::{BatchOrchestrator, Config};

/// Message recorded on jobs reconciled after an abrupt shutdown.
pub const ABANDONED_MESSAGE: &str = "abandoned: process stopped before the run finished";

/// Concrete wiring of configuration, the SQLite store and the HTTP providers.
pub struct Runner {
    pub cfg: Config,
    pub store: Arc<SqliteJobStore>,
}

impl Runner {
    pub fn open(cfg: Config) -> Result<Self> {
        let db_path = cfg.database_path();
        let store = SqliteJobStore::open(&db_path)?;
        Ok(Self {
            cfg,
            store: Arc::new(store),
        })
    }

    /// Write a default config if none exists and create the database.
    pub fn init(config_path: &Path) -> Result<Config> {
        let cfg = if config_path.exists() {
            Config::load_from(config_path)?
        } else {
            let cfg = Config::default();
            cfg.save_to(config_path)?;
            cfg
        };
        let _ = SqliteJobStore::open(&cfg.database_path())?;
        std::fs::create_dir_all(cfg.output_dir())
            .with_context(|| format!("create output dir {}", cfg.output_dir().display()))?;
        Ok(cfg)
    }

    pub fn resource_provider(&self) -> Result<Arc<ProxmoxClient>> {
        Ok(Arc::new(ProxmoxClient::new(&self.cfg.proxmox_settings())?))
    }

    pub fn orchestrator(&self) -> Result<BatchOrchestrator> {
        self.orchestrator_with(self.resource_provider()?)
    }

    /// Build the orchestrator around an existing resource provider so callers that also
    /// query the cluster directly share one client and its login ticket.
    pub fn orchestrator_with(&self, resources: Arc<dyn ResourceProvider>) -> Result<BatchOrchestrator> {
        let analysis = Arc::new(AnthropicClient::new(&self.cfg.anthropic_settings())?);
        let writer = FsArtifactWriter::new(self.cfg.output_dir()).with_options(self.cfg.writer_options());
        Ok(BatchOrchestrator::new(
            resources,
            analysis,
            self.store.clone(),
            Arc::new(writer),
            self.cfg.batch_settings(),
        ))
    }
}
