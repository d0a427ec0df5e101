//! Runtime configuration, deserialised from `config.toml` and `ROADWATCH_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use roadwatch_core::incident::NewIncidentType;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                     String,
  #[serde(default = "default_port")]
  pub port:                     u16,
  #[serde(default = "default_store_path")]
  pub store_path:               PathBuf,
  /// Only `production` enforces the per-user report cooldown.
  #[serde(default = "default_environment")]
  pub environment:              String,
  /// Base URL of the identity service.
  pub users_base_url:           String,
  #[serde(default = "default_moderation_interval")]
  pub moderation_interval_secs: u64,
  #[serde(default)]
  pub bus:                      BusConfig,
  /// Types inserted at startup when no type of the same name exists.
  #[serde(default)]
  pub incident_types:           Vec<NewIncidentType>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
  Redis,
  #[default]
  Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
  #[serde(default)]
  pub kind:     BusKind,
  /// Required for `redis`, e.g. `redis://127.0.0.1:6379`.
  #[serde(default)]
  pub url:      Option<String>,
  #[serde(default = "default_channel")]
  pub channel:  String,
  #[serde(default = "default_capacity")]
  pub capacity: usize,
}

impl Default for BusConfig {
  fn default() -> Self {
    Self {
      kind:     BusKind::default(),
      url:      None,
      channel:  default_channel(),
      capacity: default_capacity(),
    }
  }
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("roadwatch.db") }
fn default_environment() -> String { "production".into() }
fn default_moderation_interval() -> u64 { 60 }
fn default_channel() -> String { "incidents".into() }
fn default_capacity() -> usize { roadwatch_engine::notifier::DEFAULT_CAPACITY }

impl ServerConfig {
  /// Layer `path` (optional) under `ROADWATCH_*` variables; nested keys use
  /// `__`, e.g. `ROADWATCH_BUS__URL`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("ROADWATCH")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn defaults_fill_optional_fields() {
    let dir = std::env::temp_dir().join(format!("roadwatch-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
      file,
      r#"
users_base_url = "http://users.local"

[[incident_types]]
name = "Accident"
lifetime_without_confirmation = 1800
global_lifetime = 7200
negative_reports_threshold = 3
"#
    )
    .unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.environment, "production");
    assert_eq!(cfg.moderation_interval_secs, 60);
    assert_eq!(cfg.bus.kind, BusKind::Log);
    assert_eq!(cfg.bus.channel, "incidents");
    assert_eq!(cfg.bus.capacity, 1);
    assert_eq!(cfg.incident_types.len(), 1);
    assert_eq!(cfg.incident_types[0].positive_reports_threshold, 0);

    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
