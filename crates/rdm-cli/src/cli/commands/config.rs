//! `rdm config` – show where the config lives and what is in effect.

use anyhow::Result;
use rdm_core::config::{self, RdmConfig};

pub fn run_config(cfg: &RdmConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    println!("# download directory: {}", cfg.download_dir().display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
