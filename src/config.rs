//! Loading service configuration from TOML.
//!
//! Every section and field is optional; see `AppConfig` for the schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::expr::EvalLimits;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub server: ServerCfg,
  #[serde(default)]
  pub store: StoreCfg,
  /// Caps applied to learner submissions.
  #[serde(default)]
  pub limits: EvalLimits,
  #[serde(default)]
  pub generation: GenerationCfg,
  #[serde(default)]
  pub display: DisplayCfg,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
  pub port: u16,
}

impl Default for ServerCfg {
  fn default() -> Self { Self { port: 5000 } }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreCfg {
  pub ttl_secs: u64,
  pub capacity: usize,
}

impl Default for StoreCfg {
  fn default() -> Self { Self { ttl_secs: 3600, capacity: 10_000 } }
}

impl StoreCfg {
  pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationCfg {
  pub max_attempts: usize,
}

impl Default for GenerationCfg {
  fn default() -> Self { Self { max_attempts: 10 } }
}

/// Truncation widths for text sent back to the browser.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DisplayCfg {
  pub context_chars: usize,
  pub result_chars: usize,
}

impl Default for DisplayCfg {
  fn default() -> Self { Self { context_chars: 60, result_chars: 100 } }
}

/// Load `AppConfig` from COMPDRILL_CONFIG_PATH. A missing variable yields
/// defaults silently; an unreadable or invalid file logs and yields defaults.
pub fn load_config_from_env() -> AppConfig {
  let Ok(path) = std::env::var("COMPDRILL_CONFIG_PATH") else {
    return AppConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "compdrill_backend", %path, "Loaded config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "compdrill_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        AppConfig::default()
      }
    },
    Err(e) => {
      error!(target: "compdrill_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      AppConfig::default()
    }
  }
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> { toml::from_str::<AppConfig>(s) }
