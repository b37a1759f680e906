use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stream::DEFAULT_BUFFER_SIZE;

pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine address: `unix:///path`, `tcp://host:port` or `http://host:port`.
    pub docker_host: String,
    /// Pin requests to an API version such as `1.43`. Unversioned when unset.
    pub api_version: Option<String>,
    /// TCP connect timeout in seconds; `0` disables it.
    pub connect_timeout: u64,
    pub pump_buffer_size: usize,
}

impl Config {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout > 0).then(|| Duration::from_secs(self.connect_timeout))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_host: DEFAULT_DOCKER_HOST.to_string(),
            api_version: None,
            connect_timeout: 10,
            pump_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: Config = serde_yaml::from_str("api_version: \"1.43\"\n").unwrap();
        assert_eq!(cfg.api_version.as_deref(), Some("1.43"));
        assert_eq!(cfg.docker_host, DEFAULT_DOCKER_HOST);
        assert_eq!(cfg.pump_buffer_size, 1024);
        assert_eq!(cfg.connect_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn zero_connect_timeout_means_none() {
        let cfg: Config = serde_yaml::from_str("connect_timeout: 0\n").unwrap();
        assert_eq!(cfg.connect_timeout(), None);
    }

    #[test]
    fn empty_mapping_is_default() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
    }
}
