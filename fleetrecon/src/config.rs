use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "fleetrecon.yaml";

/// Settings file contents. Anything given on the command line wins over these.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub domains: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub fleet: Option<String>,
    pub instances: Option<u32>,
    pub templates: Option<String>,
    pub config_subfinder: Option<PathBuf>,
    pub config_nuclei: Option<PathBuf>,
    pub split_by_target: Option<bool>,
    pub axiom_bin: Option<PathBuf>,
    pub axiom_scp_bin: Option<PathBuf>,
}

/// Load the settings file. An explicit path must exist and parse; without one,
/// `./fleetrecon.yaml` is used only if present.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(cfg))
}
