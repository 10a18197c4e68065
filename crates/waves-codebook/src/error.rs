//! Error types for the waves-codebook parsers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unterminated quoted string on line {line}")]
  UnterminatedQuote { line: usize },

  #[error("malformed XML: {0}")]
  Xml(String),

  #[error("codebook declares no variables")]
  NoVariables,

  #[error("cannot infer codebook format from {0:?}")]
  UnknownFormat(PathBuf),

  #[error("reading {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
