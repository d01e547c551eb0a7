use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::{LocalRetry, RetryPolicy};

/// Retry parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Automatic job-level retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff (1.0 = 2^k seconds).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Tries per probe / chunk request inside one attempt.
    #[serde(default = "default_local_attempts")]
    pub local_attempts: u32,
    /// Fixed pause between those tries, in milliseconds.
    #[serde(default = "default_local_delay_ms")]
    pub local_delay_ms: u64,
}

fn default_local_attempts() -> u32 {
    3
}

fn default_local_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_secs: 1.0,
            max_delay_secs: 60,
            local_attempts: default_local_attempts(),
            local_delay_ms: default_local_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }

    pub fn local(&self) -> LocalRetry {
        LocalRetry {
            attempts: self.local_attempts.max(1),
            delay: Duration::from_millis(self.local_delay_ms),
        }
    }
}

/// Global configuration loaded from `~/.config/rdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdmConfig {
    /// Network read unit in bytes.
    pub chunk_size: usize,
    /// Connections per job for parallel transfers.
    pub connections: usize,
    /// Jobs allowed to transfer at the same time.
    pub max_concurrent_jobs: usize,
    /// Send large (> 500 MiB) HTTPS transfers over a single connection.
    #[serde(default = "default_force_single_tls")]
    pub force_single_tls: bool,
    /// Default destination directory; platform download dir when missing.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_force_single_tls() -> bool {
    true
}

impl Default for RdmConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            connections: 8,
            max_concurrent_jobs: 3,
            force_single_tls: true,
            download_dir: None,
            retry: None,
        }
    }
}

impl RdmConfig {
    /// Snapshot of the values a job reads once at creation.
    pub fn job_config(&self) -> JobConfig {
        let retry = self.retry.clone().unwrap_or_default();
        JobConfig {
            chunk_size: self.chunk_size.max(1),
            connections: self.connections.max(1),
            retry: retry.policy(),
            local_retry: retry.local(),
            force_single_tls: self.force_single_tls,
        }
    }

    /// Destination directory for jobs admitted without an explicit path.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Per-job configuration snapshot. Not hot-reloaded mid-transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobConfig {
    /// Network read unit in bytes.
    pub chunk_size: usize,
    /// Configured connection count.
    pub connections: usize,
    /// Job-level backoff.
    pub retry: RetryPolicy,
    /// Probe and chunk-level retries.
    pub local_retry: LocalRetry,
    /// Apply the large-HTTPS single-stream rule.
    pub force_single_tls: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        RdmConfig::default().job_config()
    }
}

impl JobConfig {
    /// Receive buffer handed to curl (curl accepts 1 KiB..512 KiB).
    pub fn receive_buffer(&self) -> usize {
        self.chunk_size.clamp(1024, 512 * 1024)
    }

    /// Buffer for checkpoint and part file writes.
    pub fn write_buffer(&self) -> usize {
        self.chunk_size.max(64 * 1024)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: RdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
