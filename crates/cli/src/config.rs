use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kat_rules::RuleSet;
use tracing::debug;

/// Return the default config directory path: ~/.config/kat/
pub fn default_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("could not determine user config directory")?
        .join("kat");
    Ok(config_dir)
}

/// Return the default config file path.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_config_dir()?.join("config.yaml"))
}

/// Load the rule set from `path`, or the default path.
///
/// An explicit path must exist. A missing default file falls back to the
/// built-in rule set, which is written there as a starting point.
pub fn load_rule_set(path: Option<&Path>) -> Result<RuleSet> {
    if let Some(path) = path {
        return RuleSet::load(path)
            .with_context(|| format!("failed to load config: {}", path.display()));
    }

    let config_path = match default_config_path() {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "no config directory, using built-in rules");
            return Ok(RuleSet::default());
        }
    };
    load_or_init(&config_path)
}

fn load_or_init(config_path: &Path) -> Result<RuleSet> {
    if config_path.exists() {
        debug!(?config_path, "Loading config");
        return RuleSet::load(config_path)
            .with_context(|| format!("failed to load config: {}", config_path.display()));
    }

    debug!(?config_path, "Config file not found, using defaults");
    let rules = RuleSet::default();
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let yaml = rules.to_yaml().context("failed to serialize default config")?;
    fs::write(config_path, yaml).ok();
    Ok(rules)
}
