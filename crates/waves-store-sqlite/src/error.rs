//! Error type for `waves-store-sqlite`.

use thiserror::Error;
use waves_core::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  /// A load rejected by the metadata contract; nothing was written.
  #[error(transparent)]
  Core(#[from] waves_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown load mode in survey_years: {0:?}")]
  InvalidLoadMode(String),
}

impl StoreError for Error {
  fn into_rejection(self) -> Result<waves_core::Error, Self> {
    match self {
      Self::Core(e) => Ok(e),
      other => Err(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
