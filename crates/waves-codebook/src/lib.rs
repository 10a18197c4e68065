//! Codebook parsers for Waves.
//!
//! Turns one survey year's raw codebook into variable and value-label
//! records. Pure synchronous; no database or HTTP dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use waves_codebook::{CodebookFormat, parse};
//!
//! let syntax = "VARIABLE LABELS SEX 'Sex of respondent'.\n\
//!               VALUE LABELS SEX 1 'Male' 2 'Female'.\n";
//! let parsed = parse(syntax, CodebookFormat::SpssSyntax).unwrap();
//! println!("{} variables, {} labels", parsed.variables.len(), parsed.value_labels.len());
//! ```

mod ddi;
pub mod error;
pub mod source;
mod spss;

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use waves_core::metadata::{ValueLabelRecord, VariableRecord, YearMetadata};

pub use error::{Error, Result};
pub use source::{CodebookSource, FileSource, TextSource};

// ─── Public types
// ─────────────────────────────────────────────────────────────

/// The codebook dialects understood by [`parse`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum CodebookFormat {
  /// SPSS command syntax: `VARIABLE LABELS`, `VALUE LABELS`, `FORMATS`, ...
  SpssSyntax,
  /// DDI Codebook XML (`<codeBook><dataDscr><var>`).
  Ddi,
}

impl CodebookFormat {
  /// Infer the format from a file extension.
  pub fn from_path(path: &Path) -> Option<Self> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
      "sps" | "syntax" | "txt" => Some(Self::SpssSyntax),
      "xml" | "ddi" => Some(Self::Ddi),
      _ => None,
    }
  }
}

/// The records extracted from one codebook, in codebook order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCodebook {
  pub variables:    Vec<VariableRecord>,
  /// May name variables missing from `variables`; the loader rejects those.
  pub value_labels: Vec<ValueLabelRecord>,
}

impl ParsedCodebook {
  /// Attach a survey year (and optional provenance) to the records.
  pub fn into_year(self, year: i32, source: Option<String>) -> YearMetadata {
    YearMetadata {
      year,
      source,
      variables: self.variables,
      value_labels: self.value_labels,
    }
  }
}

// ─── Public API
// ───────────────────────────────────────────────────────────────

/// Parse a codebook in the given format.
///
/// Unknown commands, unknown storage types, and malformed label pairs are
/// skipped or degraded with a warning. Structural damage, or a codebook that
/// yields no variables at all, is an error.
pub fn parse(input: &str, format: CodebookFormat) -> Result<ParsedCodebook> {
  let parsed = match format {
    CodebookFormat::SpssSyntax => spss::parse_syntax(input)?,
    CodebookFormat::Ddi => ddi::parse_codebook(input)?,
  };
  if parsed.variables.is_empty() {
    return Err(Error::NoVariables);
  }
  Ok(parsed)
}

/// Read and parse a codebook from any [`CodebookSource`].
pub fn parse_source<S: CodebookSource + ?Sized>(source: &S) -> Result<ParsedCodebook> {
  let text = source.read_to_string()?;
  parse(&text, source.format())
}
