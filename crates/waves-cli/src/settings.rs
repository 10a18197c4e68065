//! Layered configuration: an optional TOML file under `WAVES_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use waves_core::harmonize::YearSpan;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite file holding the registry. A leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path:   PathBuf,
  #[serde(default = "default_host")]
  pub host:         String,
  #[serde(default = "default_port")]
  pub port:         u16,
  /// Overrides the known year range; both ends must be set together.
  #[serde(default)]
  pub first_year:   Option<i32>,
  #[serde(default)]
  pub last_year:    Option<i32>,
  /// Default directory for `waves load --dir`.
  #[serde(default)]
  pub codebook_dir: Option<PathBuf>,
}

fn default_store_path() -> PathBuf { PathBuf::from("waves.db") }

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

impl Settings {
  /// Read `path` (if it exists) and overlay `WAVES_*` variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let cfg = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("WAVES"))
      .build()
      .context("failed to read config file")?;
    Self::from_config(cfg)
  }

  fn from_config(cfg: config::Config) -> anyhow::Result<Self> {
    cfg
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  /// The configured year range, if any.
  pub fn year_span(&self) -> anyhow::Result<Option<YearSpan>> {
    match (self.first_year, self.last_year) {
      (Some(first), Some(last)) => Ok(Some(YearSpan::new(first, last)?)),
      (None, None) => Ok(None),
      _ => anyhow::bail!("first_year and last_year must be set together"),
    }
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
