use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{Result, RouterError};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| RouterError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| RouterError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.interfaces.is_empty() {
        return Err(RouterError::Config("at least one interface is required".into()));
    }
    if cfg.interfaces.len() > 32 {
        return Err(RouterError::Config(format!(
            "{} interfaces exceed the 32-bit receive mask",
            cfg.interfaces.len()
        )));
    }

    let mut seen = HashSet::new();
    for iface in &cfg.interfaces {
        if iface.prefix_len > 32 {
            return Err(RouterError::Config(format!(
                "prefix length {} on {} is out of range",
                iface.prefix_len, iface.addr
            )));
        }
        if !seen.insert(iface.addr) {
            return Err(RouterError::Config(format!(
                "duplicate interface address: {}",
                iface.addr
            )));
        }
    }

    if cfg.timers.periodic_secs == 0 {
        return Err(RouterError::Config("timers.periodic_secs must be at least 1".into()));
    }
    if cfg.timers.triggered_min_ms > cfg.timers.triggered_max_ms {
        return Err(RouterError::Config(format!(
            "triggered jitter bounds are inverted: {} > {}",
            cfg.timers.triggered_min_ms, cfg.timers.triggered_max_ms
        )));
    }

    Ok(())
}
