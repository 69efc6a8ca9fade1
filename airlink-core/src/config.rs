//! Link configuration: rendezvous network identity and channel.

use serde::Deserialize;

/// Network name the receiver advertises. The transmitter treats its
/// configured name as a prefix when matching scan results, so deployments
/// may append a node suffix to the advertised form.
pub const DEFAULT_NETWORK_NAME: &str = "ESP32-ESPNOW-WLAN";

/// Password for the hosted rendezvous network.
pub const DEFAULT_NETWORK_PASSWORD: &str = "vdjfiend#d0%d";

/// Logical radio channel both ends use.
pub const DEFAULT_CHANNEL: u8 = 1;

/// Identity of the rendezvous network the two nodes meet on.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_network_name")]
    pub network_name: String,
    #[serde(default = "default_network_password")]
    pub network_password: String,
    #[serde(default = "default_channel")]
    pub channel: u8,
}

fn default_network_name() -> String {
    DEFAULT_NETWORK_NAME.to_string()
}

fn default_network_password() -> String {
    DEFAULT_NETWORK_PASSWORD.to_string()
}

fn default_channel() -> u8 {
    DEFAULT_CHANNEL
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            network_name: default_network_name(),
            network_password: default_network_password(),
            channel: default_channel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identity_values() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.network_name, "ESP32-ESPNOW-WLAN");
        assert_eq!(cfg.channel, 1);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: LinkConfig = toml::from_str("network_name = \"BENCH-LINK\"").unwrap();
        assert_eq!(cfg.network_name, "BENCH-LINK");
        assert_eq!(cfg.network_password, DEFAULT_NETWORK_PASSWORD);
        assert_eq!(cfg.channel, DEFAULT_CHANNEL);
    }
}
