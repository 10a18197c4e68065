//! Error types for `waves-core`.
//!
//! The first three variants are the hard rejections of a year's metadata
//! load. Each one aborts that year atomically and carries enough context for
//! a batch driver to log the failure and move on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The codebook for `year` could not be turned into variable records.
  #[error("metadata extraction failed for {year}: {reason}")]
  MetadataExtraction { year: i32, reason: String },

  /// Value labels reference variables that are not declared for `year`.
  #[error("value labels for {year} reference undeclared variables: {}", variables.join(", "))]
  OrphanedValueLabel { year: i32, variables: Vec<String> },

  /// Keys that already exist (append mode) or repeat within one batch.
  #[error("duplicate metadata keys for {year}: {}", keys.join(", "))]
  DuplicateMetadata { year: i32, keys: Vec<String> },

  /// An availability label was requested for a name with no definitions.
  #[error("variable not present in any loaded year: {0}")]
  UnknownVariable(String),

  #[error("invalid year span: {first}..={last}")]
  InvalidYearSpan { first: i32, last: i32 },
}

impl Error {
  /// The survey year a load rejection belongs to, if any.
  pub fn year(&self) -> Option<i32> {
    match self {
      Self::MetadataExtraction { year, .. }
      | Self::OrphanedValueLabel { year, .. }
      | Self::DuplicateMetadata { year, .. } => Some(*year),
      Self::UnknownVariable(_) | Self::InvalidYearSpan { .. } => None,
    }
  }

  /// Whether this error is one of the three per-year load rejections.
  pub fn is_load_rejection(&self) -> bool { self.year().is_some() }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
