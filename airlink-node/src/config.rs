//! Load config from file and environment.

use airlink_core::LinkConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Daemon configuration. File: ~/.config/airlink/config.toml or
/// /etc/airlink/config.toml.
/// Env overrides: AIRLINK_ROLE, AIRLINK_PORT, AIRLINK_NODE_ADDR,
/// AIRLINK_NETWORK_NAME.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `transmitter` or `receiver`. Must come from the file or AIRLINK_ROLE;
    /// anything else is fatal.
    #[serde(default)]
    pub role: Option<String>,
    /// UDP port the radio shim binds (default 47800).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fixed node hardware address; generated at startup when absent.
    #[serde(default)]
    pub node_addr: Option<String>,
    /// Suffix appended to the advertised network name, so several receivers
    /// can share a prefix (e.g. `Node7`).
    #[serde(default)]
    pub node_suffix: Option<String>,
    #[serde(default)]
    pub link: LinkConfig,
}

fn default_port() -> u16 {
    47800
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: None,
            port: default_port(),
            node_addr: None,
            node_suffix: None,
            link: LinkConfig::default(),
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("AIRLINK_ROLE") {
        c.role = Some(s);
    }
    if let Ok(s) = std::env::var("AIRLINK_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.port = p;
        }
    }
    if let Ok(s) = std::env::var("AIRLINK_NODE_ADDR") {
        c.node_addr = Some(s);
    }
    if let Ok(s) = std::env::var("AIRLINK_NETWORK_NAME") {
        c.link.network_name = s;
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/airlink/config.toml"));
    }
    out.push(PathBuf::from("/etc/airlink/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            if let Ok(s) = std::fs::read_to_string(&p) {
                if let Ok(c) = toml::from_str::<Config>(&s) {
                    return Some(c);
                }
            }
            break;
        }
    }
    None
}
