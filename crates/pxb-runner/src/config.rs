use anyhow::{Context, Result};
use pxb_anthropic::{AnthropicSettings, DEFAULT_BASE_URL};
use pxb_artifacts::WriterOptions;
use pxb_core::DEFAULT_BATCH_SIZE;
use pxb_proxmox::ProxmoxSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analyzer::ArtifactToggles;
use crate::orchestrator::BatchSettings;

pub const DEFAULT_CONFIG_FILE: &str = "pxb.toml";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxmox: ProxmoxConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxmoxConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub token_value: Option<String>,
    #[serde(default)]
    pub verify_ssl: bool,
    #[serde(default = "default_proxmox_timeout")]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "yes")]
    pub security_review: bool,
    #[serde(default = "yes")]
    pub optimization: bool,
    #[serde(default = "yes")]
    pub infra_templates: bool,
    #[serde(default = "yes")]
    pub config_templates: bool,
    /// Fail the job once more than this many analysis tasks are dropped. Unset tolerates any number.
    #[serde(default)]
    pub max_dropped_results: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_port() -> u16 {
    8006
}
fn default_user() -> String {
    "root@pam".to_string()
}
fn default_proxmox_timeout() -> u64 {
    30
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    8000
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_analysis_timeout() -> u64 {
    120
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn yes() -> bool {
    true
}
fn default_database() -> String {
    "./data/pxb.db".to_string()
}
fn default_output_dir() -> String {
    "./output".to_string()
}
fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for ProxmoxConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_port(),
            user: default_user(),
            password: None,
            token_name: None,
            token_value: None,
            verify_ssl: false,
            timeout_secs: default_proxmox_timeout(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: default_base_url(),
            timeout_secs: default_analysis_timeout(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            security_review: true,
            optimization: true,
            infra_templates: true,
            config_templates: true,
            max_dropped_results: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// File if present, defaults otherwise, then secrets from the environment.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() { Self::load_from(path)? } else { Self::default() };
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ANTHROPIC_API_KEY") {
            self.analysis.api_key = v;
        }
        if let Some(v) = lookup("PXB_PROXMOX_PASSWORD") {
            self.proxmox.password = Some(v);
        }
        if let Some(v) = lookup("PXB_PROXMOX_TOKEN_VALUE") {
            self.proxmox.token_value = Some(v);
        }
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.database).to_string())
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.output_dir).to_string())
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch.batch_size,
            toggles: ArtifactToggles {
                security_review: self.batch.security_review,
                optimization: self.batch.optimization,
                infra_templates: self.batch.infra_templates,
                config_templates: self.batch.config_templates,
            },
            max_dropped_results: self.batch.max_dropped_results,
        }
    }

    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            infra_templates: self.batch.infra_templates,
            config_templates: self.batch.config_templates,
        }
    }

    pub fn proxmox_settings(&self) -> ProxmoxSettings {
        ProxmoxSettings {
            host: self.proxmox.host.clone(),
            port: self.proxmox.port,
            user: self.proxmox.user.clone(),
            password: self.proxmox.password.clone(),
            token_name: self.proxmox.token_name.clone(),
            token_value: self.proxmox.token_value.clone(),
            verify_ssl: self.proxmox.verify_ssl,
            timeout_secs: self.proxmox.timeout_secs,
        }
    }

    pub fn anthropic_settings(&self) -> AnthropicSettings {
        AnthropicSettings {
            api_key: self.analysis.api_key.clone(),
            model: self.analysis.model.clone(),
            max_tokens: self.analysis.max_tokens,
            base_url: self.analysis.base_url.clone(),
            timeout_secs: self.analysis.timeout_secs,
        }
    }
}
