//! Encoding and decoding helpers between domain types and the plain-text
//! columns stored in SQLite.
//!
//! Timestamps are RFC 3339 strings; enums use their lowercase `strum` names.

use chrono::{DateTime, Utc};
use waves_core::metadata::{
  LoadMode, StorageType, ValueLabel, VariableDefinition, YearSummary,
};

use crate::{Error, Result};

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── LoadMode ────────────────────────────────────────────────────────────────

pub fn encode_load_mode(mode: LoadMode) -> &'static str {
  match mode {
    LoadMode::Replace => "replace",
    LoadMode::Append => "append",
  }
}

pub fn decode_load_mode(s: &str) -> Result<LoadMode> {
  s.parse().map_err(|_| Error::InvalidLoadMode(s.to_owned()))
}

// ─── LIKE patterns ───────────────────────────────────────────────────────────

/// `%keyword%` with `\`, `%` and `_` escaped for `LIKE ... ESCAPE '\'`.
pub fn contains_pattern(keyword: &str) -> String {
  let mut out = String::with_capacity(keyword.len() + 2);
  out.push('%');
  for c in keyword.chars() {
    if matches!(c, '\\' | '%' | '_') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns read from a `variables` row.
pub struct RawVariable {
  pub variable_name: String,
  pub year:          i32,
  pub label:         Option<String>,
  pub storage_type:  String,
}

impl RawVariable {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      variable_name: row.get(0)?,
      year:          row.get(1)?,
      label:         row.get(2)?,
      storage_type:  row.get(3)?,
    })
  }

  /// Unrecognised storage types degrade to `Unknown` rather than fail a read.
  pub fn into_definition(self) -> VariableDefinition {
    VariableDefinition {
      variable_name: self.variable_name,
      year:          self.year,
      label:         self.label,
      storage_type:  StorageType::parse_lossy(&self.storage_type),
    }
  }
}

/// Raw columns read from a `value_labels` row.
pub struct RawValueLabel {
  pub variable_name: String,
  pub year:          i32,
  pub coded_value:   String,
  pub label_text:    String,
}

impl RawValueLabel {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      variable_name: row.get(0)?,
      year:          row.get(1)?,
      coded_value:   row.get(2)?,
      label_text:    row.get(3)?,
    })
  }

  pub fn into_label(self) -> ValueLabel {
    ValueLabel {
      variable_name: self.variable_name,
      year:          self.year,
      coded_value:   self.coded_value,
      label_text:    self.label_text,
    }
  }
}

/// A `survey_years` row joined with per-year row counts.
pub struct RawYearSummary {
  pub year:         i32,
  pub source:       Option<String>,
  pub mode:         String,
  pub loaded_at:    String,
  pub variables:    i64,
  pub value_labels: i64,
}

impl RawYearSummary {
  pub fn into_summary(self) -> Result<YearSummary> {
    Ok(YearSummary {
      year:         self.year,
      variables:    usize::try_from(self.variables).unwrap_or_default(),
      value_labels: usize::try_from(self.value_labels).unwrap_or_default(),
      source:       self.source,
      mode:         decode_load_mode(&self.mode)?,
      loaded_at:    decode_dt(&self.loaded_at)?,
    })
  }
}
