//! Error type for `waves-registry`.

use polars::prelude::PolarsError;
use thiserror::Error;
use waves_core::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  /// A load rejection or caller error from the metadata contract.
  #[error(transparent)]
  Metadata(#[from] waves_core::Error),

  #[error("store error: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync>),

  #[error("column not found in table: {0}")]
  MissingColumn(String),

  #[error("table error: {0}")]
  Table(#[from] PolarsError),
}

impl Error {
  /// Wrap a backend error, keeping metadata rejections as [`Error::Metadata`].
  pub fn from_store<E: StoreError>(err: E) -> Self {
    match err.into_rejection() {
      Ok(rejection) => Self::Metadata(rejection),
      Err(other) => Self::Store(Box::new(other)),
    }
  }

  /// The year-scoped load rejection behind this error, if it is one.
  pub fn rejection(&self) -> Option<&waves_core::Error> {
    match self {
      Self::Metadata(e) if e.is_load_rejection() => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
