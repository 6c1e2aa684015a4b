use std::net::Ipv4Addr;

use serde::{Deserialize, Deserializer};

use crate::hal::{parse_mac, MacAddr};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The fixed set of attached interfaces; position in the list is the
    /// interface index the rest of the system uses. At least one required.
    pub interfaces: Vec<InterfaceConfig>,
    /// Announcement timer settings
    #[serde(default)]
    pub timers: TimerConfig,
}

/// One directly attached interface
#[derive(Debug, Deserialize, Clone)]
pub struct InterfaceConfig {
    /// Local IPv4 address of the interface
    /// Example: "192.168.3.2"
    pub addr: Ipv4Addr,
    /// Prefix length of the directly connected network seeded at startup
    /// Default: 24
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,
    /// Static ARP entries for the replay HAL (optional)
    #[serde(default)]
    pub neighbors: Vec<NeighborConfig>,
}

/// A statically known on-link neighbor
#[derive(Debug, Deserialize, Clone)]
pub struct NeighborConfig {
    pub ip: Ipv4Addr,
    /// Link address, colon-separated hex
    /// Example: "02:00:00:00:03:01"
    #[serde(deserialize_with = "de_mac")]
    pub mac: MacAddr,
}

/// Announcement timing
#[derive(Debug, Deserialize, Clone)]
pub struct TimerConfig {
    /// Seconds between full-table announcements
    /// The lab-scale default is 5; RFC 2453 would use 30
    #[serde(default = "default_periodic_secs")]
    pub periodic_secs: u64,
    /// Lower bound of the triggered-update jitter, milliseconds
    #[serde(default = "default_triggered_min_ms")]
    pub triggered_min_ms: u64,
    /// Upper bound of the triggered-update jitter, milliseconds
    #[serde(default = "default_triggered_max_ms")]
    pub triggered_max_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            periodic_secs: default_periodic_secs(),
            triggered_min_ms: default_triggered_min_ms(),
            triggered_max_ms: default_triggered_max_ms(),
        }
    }
}

fn default_prefix_len() -> u8 {
    24
}

fn default_periodic_secs() -> u64 {
    5
}

fn default_triggered_min_ms() -> u64 {
    1000
}

fn default_triggered_max_ms() -> u64 {
    5000
}

fn de_mac<'de, D>(deserializer: D) -> Result<MacAddr, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_mac(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid MAC address: {s}")))
}
