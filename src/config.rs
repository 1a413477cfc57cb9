use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::monitor::DEFAULT_MONITOR_PORTS;
use crate::sender::DEFAULT_WAKE_PORT;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/wolman/config.yml";

/// Deserializes an absent field as None and an unset field as T::default.
///
/// This avoids having Option<Option<T>> as in serde_with::rust::double_option
pub fn deserialize_absent_or_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Default + Deserialize<'de>,
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.or(Some(T::default())))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    pub broadcast: Ipv4Addr,
    pub port: u16,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self { broadcast: Ipv4Addr::BROADCAST, port: DEFAULT_WAKE_PORT }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub listen_addr: IpAddr,
    pub ports: Vec<u16>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ports: DEFAULT_MONITOR_PORTS.to_vec(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "deserialize_absent_or_null")]
    wake: Option<WakeConfig>,

    #[serde(default, deserialize_with = "deserialize_absent_or_null")]
    listen: Option<ListenConfig>,

    /// Alias -> hardware address string, so `wolman wake office-pc` works.
    #[serde(default)]
    hosts: HashMap<String, String>,
}

impl Config {
    pub fn wake(&self) -> WakeConfig {
        self.wake.clone().unwrap_or_default()
    }

    pub fn listen(&self) -> ListenConfig {
        self.listen.clone().unwrap_or_default()
    }

    pub fn resolve_host(&self, alias: &str) -> Option<&str> {
        self.hosts.get(alias).map(String::as_str)
    }

    pub fn parse(s: &str) -> Result<Self> {
        serde_yml::from_str(s).context("malformed config file")
    }

    /// Loads from `explicit` if given (missing file is then an error), else
    /// from the default path, falling back to defaults when it doesn't exist.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let raw = shellexpand::tilde(explicit.unwrap_or(DEFAULT_CONFIG_PATH)).into_owned();
        let path = Path::new(&raw);

        if !path.exists() {
            if explicit.is_some() {
                anyhow::bail!("config file '{raw}' does not exist");
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config file '{raw}'"))?;
        Self::parse(&content)
    }
}
