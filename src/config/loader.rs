use std::path::Path;

use anyhow::{Context, Result};

use super::types::Config;

pub const CONFIG_FILE: &str = ".dockstream.yaml";

/// Load config from a `.dockstream.yaml` file in `dir`, falling back to
/// defaults, then apply `DOCKER_HOST` / `DOCKER_API_VERSION` overrides.
pub fn load(dir: &Path) -> Result<Config> {
    let cfg = load_file(dir)?.unwrap_or_default();
    Ok(apply_env(cfg, |key| std::env::var(key).ok()))
}

/// Parse the config file in `dir`, if there is one.
pub fn load_file(dir: &Path) -> Result<Option<Config>> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(config))
}

/// Overlay the standard engine environment variables. Empty values are ignored.
pub fn apply_env(mut cfg: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(host) = lookup("DOCKER_HOST").filter(|v| !v.is_empty()) {
        cfg.docker_host = host;
    }
    if let Some(version) = lookup("DOCKER_API_VERSION").filter(|v| !v.is_empty()) {
        cfg.api_version = Some(version);
    }
    cfg
}
