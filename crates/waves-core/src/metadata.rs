//! Variable and value-label records.
//!
//! A codebook parser produces [`VariableRecord`]s and [`ValueLabelRecord`]s
//! for one survey year; they travel together as a [`YearMetadata`] batch into
//! a [`crate::store::MetadataStore`], which persists them as
//! [`VariableDefinition`]s and [`ValueLabel`]s keyed by year.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Storage type ────────────────────────────────────────────────────────────

/// How a variable is stored in the survey extract. Informational only; nothing
/// in the registry branches on it.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StorageType {
  Numeric,
  #[serde(rename = "string")]
  #[strum(serialize = "string")]
  Text,
  /// Sentinel for missing or unrecognised type information.
  #[default]
  Unknown,
}

impl StorageType {
  /// Parse a type name, degrading anything unrecognised to
  /// [`StorageType::Unknown`].
  pub fn parse_lossy(s: &str) -> Self { s.trim().parse().unwrap_or(Self::Unknown) }
}

// ─── Load mode ───────────────────────────────────────────────────────────────

/// Insert semantics for a year's metadata.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LoadMode {
  /// Drop everything already stored for the year, then insert.
  Replace,
  /// Insert only; any existing `(variable_name, year)` key is an error.
  Append,
}

// ─── Parser output ───────────────────────────────────────────────────────────

/// One variable as declared by a codebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
  pub name:         String,
  pub label:        Option<String>,
  pub storage_type: StorageType,
}

impl VariableRecord {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:         name.into(),
      label:        None,
      storage_type: StorageType::Unknown,
    }
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }

  pub fn with_storage_type(mut self, storage_type: StorageType) -> Self {
    self.storage_type = storage_type;
    self
  }
}

/// One coded value and its label text, as written in the codebook.
///
/// `coded_value` keeps the codebook's original spelling (`"1"`, `"1.0"`,
/// `"M"`); canonicalisation happens at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueLabelRecord {
  pub variable_name: String,
  pub coded_value:   String,
  pub label_text:    String,
}

impl ValueLabelRecord {
  pub fn new(
    variable_name: impl Into<String>,
    coded_value: impl Into<String>,
    label_text: impl Into<String>,
  ) -> Self {
    Self {
      variable_name: variable_name.into(),
      coded_value:   coded_value.into(),
      label_text:    label_text.into(),
    }
  }
}

// ─── YearMetadata ────────────────────────────────────────────────────────────

/// Everything one codebook says about one survey year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearMetadata {
  pub year:         i32,
  /// Human-readable description of where the codebook came from.
  pub source:       Option<String>,
  pub variables:    Vec<VariableRecord>,
  pub value_labels: Vec<ValueLabelRecord>,
}

impl YearMetadata {
  pub fn new(year: i32) -> Self {
    Self {
      year,
      source: None,
      variables: Vec::new(),
      value_labels: Vec::new(),
    }
  }

  pub fn with_source(mut self, source: impl Into<String>) -> Self {
    self.source = Some(source.into());
    self
  }

  pub fn with_variable(mut self, variable: VariableRecord) -> Self {
    self.variables.push(variable);
    self
  }

  pub fn with_value_label(mut self, label: ValueLabelRecord) -> Self {
    self.value_labels.push(label);
    self
  }

  /// Variable names referenced by value labels but absent from `variables`,
  /// sorted and deduplicated.
  pub fn orphaned_variables(&self) -> Vec<String> {
    let declared: BTreeSet<&str> =
      self.variables.iter().map(|v| v.name.as_str()).collect();
    self
      .value_labels
      .iter()
      .map(|l| l.variable_name.as_str())
      .filter(|name| !declared.contains(name))
      .collect::<BTreeSet<_>>()
      .into_iter()
      .map(str::to_owned)
      .collect()
  }

  /// Keys that occur more than once within this batch. Variables are reported
  /// as `NAME`, value labels as `NAME=code`.
  pub fn duplicate_keys(&self) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for v in &self.variables {
      *seen.entry(v.name.clone()).or_default() += 1;
    }
    for l in &self.value_labels {
      *seen
        .entry(format!("{}={}", l.variable_name, l.coded_value))
        .or_default() += 1;
    }
    seen
      .into_iter()
      .filter(|(_, n)| *n > 1)
      .map(|(k, _)| k)
      .collect()
  }

  /// Reject the batch if it has orphaned labels or repeated keys. Orphans are
  /// checked first.
  pub fn validate(&self) -> Result<()> {
    let orphans = self.orphaned_variables();
    if !orphans.is_empty() {
      return Err(Error::OrphanedValueLabel {
        year:      self.year,
        variables: orphans,
      });
    }
    let duplicates = self.duplicate_keys();
    if !duplicates.is_empty() {
      return Err(Error::DuplicateMetadata {
        year: self.year,
        keys: duplicates,
      });
    }
    Ok(())
  }
}

// ─── Persisted forms ─────────────────────────────────────────────────────────

/// A variable as held by the registry, identified by `(variable_name, year)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDefinition {
  pub variable_name: String,
  pub year:          i32,
  pub label:         Option<String>,
  pub storage_type:  StorageType,
}

impl VariableDefinition {
  pub fn from_record(record: VariableRecord, year: i32) -> Self {
    Self {
      variable_name: record.name,
      year,
      label: record.label,
      storage_type: record.storage_type,
    }
  }
}

/// A stored value label, identified by `(variable_name, year, coded_value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueLabel {
  pub variable_name: String,
  pub year:          i32,
  pub coded_value:   String,
  pub label_text:    String,
}

/// Row counts written by a successful `load_year`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadCounts {
  pub variables_inserted: usize,
  pub labels_inserted:    usize,
}

/// Per-year inventory plus the provenance of the most recent load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
  pub year:         i32,
  pub variables:    usize,
  pub value_labels: usize,
  pub source:       Option<String>,
  pub mode:         LoadMode,
  pub loaded_at:    DateTime<Utc>,
}
