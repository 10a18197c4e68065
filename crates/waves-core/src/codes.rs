//! Coded values and their comparison form.
//!
//! Codebooks mix integer- and string-coded variables, and survey extracts
//! hand the same code back as `1`, `1.0`, or `"1"` depending on the reader.
//! Stored codes keep their original spelling. Both sides of a comparison are
//! brought to a canonical string by [`canonical_code`] at read time.

use std::{
  collections::{HashMap, hash_map::Entry},
  fmt,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

// ─── Canonical form ──────────────────────────────────────────────────────────

/// Integral floats beyond this magnitude are not collapsed to integer form.
const MAX_EXACT_INTEGRAL: f64 = 9_007_199_254_740_992.0;

/// Reduce a raw code to the form used for comparison.
///
/// - surrounding whitespace is ignored
/// - integers lose sign noise and leading zeros (`"+01"` → `"1"`)
/// - finite floats with no fractional part become integers (`"2.0"` → `"2"`)
/// - other finite floats use Rust's shortest round-trip form (`"1.50"` → `"1.5"`)
/// - everything else is compared verbatim
pub fn canonical_code(raw: &str) -> String {
  let trimmed = raw.trim();
  if let Ok(n) = trimmed.parse::<i64>() {
    return n.to_string();
  }
  if let Ok(f) = trimmed.parse::<f64>()
    && f.is_finite()
  {
    return canonical_float(f);
  }
  trimmed.to_owned()
}

fn canonical_float(f: f64) -> String {
  if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGRAL {
    // `as` is exact in this range; also folds -0.0 into 0.
    (f as i64).to_string()
  } else {
    f.to_string()
  }
}

// ─── CodedValue ──────────────────────────────────────────────────────────────

/// A code as it arrives at the decode layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodedValue {
  Int(i64),
  Float(f64),
  Text(String),
}

impl CodedValue {
  /// The comparison form; see [`canonical_code`].
  pub fn canonical(&self) -> String {
    match self {
      Self::Int(n) => n.to_string(),
      Self::Float(f) if f.is_finite() => canonical_float(*f),
      Self::Float(f) => f.to_string(),
      Self::Text(s) => canonical_code(s),
    }
  }
}

impl fmt::Display for CodedValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Int(n) => write!(f, "{n}"),
      Self::Float(x) => write!(f, "{x}"),
      Self::Text(s) => f.write_str(s),
    }
  }
}

impl From<i64> for CodedValue {
  fn from(n: i64) -> Self { Self::Int(n) }
}

impl From<i32> for CodedValue {
  fn from(n: i32) -> Self { Self::Int(n.into()) }
}

impl From<f64> for CodedValue {
  fn from(f: f64) -> Self { Self::Float(f) }
}

impl From<&str> for CodedValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for CodedValue {
  fn from(s: String) -> Self { Self::Text(s) }
}

// ─── Decoded ─────────────────────────────────────────────────────────────────

/// Outcome of decoding one value. A miss is not an error: the original code
/// is handed back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Decoded {
  Label(String),
  Raw(CodedValue),
}

impl Decoded {
  pub fn is_label(&self) -> bool { matches!(self, Self::Label(_)) }

  /// The label text, or the original code rendered as text.
  pub fn into_text(self) -> String {
    match self {
      Self::Label(s) => s,
      Self::Raw(v) => v.to_string(),
    }
  }
}

impl fmt::Display for Decoded {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Label(s) => f.write_str(s),
      Self::Raw(v) => write!(f, "{v}"),
    }
  }
}

// ─── LabelTable ──────────────────────────────────────────────────────────────

/// The value labels of one `(variable_name, year)`, indexed by canonical code.
///
/// Built once per variable and probed per row.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
  entries: HashMap<String, String>,
}

impl LabelTable {
  pub fn new() -> Self { Self::default() }

  /// Add a code → label pair. If two stored spellings collapse to the same
  /// canonical code, the first one inserted wins and the later one is
  /// reported; returns whether the pair was kept.
  pub fn insert(&mut self, coded_value: &str, label_text: &str) -> bool {
    match self.entries.entry(canonical_code(coded_value)) {
      Entry::Vacant(slot) => {
        slot.insert(label_text.to_owned());
        true
      }
      Entry::Occupied(slot) => {
        if slot.get() != label_text {
          warn!(
            code = coded_value,
            canonical = %slot.key(),
            kept = %slot.get(),
            dropped = label_text,
            "value label code collides with an earlier spelling; dropping it"
          );
        }
        false
      }
    }
  }

  pub fn lookup(&self, value: &CodedValue) -> Option<&str> {
    self.entries.get(&value.canonical()).map(String::as_str)
  }

  pub fn lookup_raw(&self, raw: &str) -> Option<&str> {
    self.entries.get(&canonical_code(raw)).map(String::as_str)
  }

  pub fn decode(&self, value: CodedValue) -> Decoded {
    match self.lookup(&value) {
      Some(label) => Decoded::Label(label.to_owned()),
      None => Decoded::Raw(value),
    }
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<'a> FromIterator<(&'a str, &'a str)> for LabelTable {
  fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
    let mut table = Self::new();
    for (code, label) in iter {
      table.insert(code, label);
    }
    table
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn colliding_spellings_keep_the_first_label() {
    let mut table = LabelTable::new();
    assert!(table.insert("01", "Northeast"));
    assert!(!table.insert("1", "North"));
    assert!(!table.insert("1.0", "Northeast"));
    assert_eq!(table.len(), 1);
    assert_eq!(table.lookup_raw("1"), Some("Northeast"));
  }

  #[test]
  fn canonical_forms() {
    assert_eq!(canonical_code("1"), "1");
    assert_eq!(canonical_code(" 1 "), "1");
    assert_eq!(canonical_code("+01"), "1");
    assert_eq!(canonical_code("1.0"), "1");
    assert_eq!(canonical_code("1.50"), "1.5");
    assert_eq!(canonical_code("-0.0"), "0");
    assert_eq!(canonical_code("1e2"), "100");
    assert_eq!(canonical_code("M"), "M");
    assert_eq!(canonical_code("NaN"), "NaN");
  }

  #[test]
  fn coded_value_variants_agree() {
    assert_eq!(CodedValue::Int(1).canonical(), "1");
    assert_eq!(CodedValue::Float(1.0).canonical(), "1");
    assert_eq!(CodedValue::from("1").canonical(), "1");
    assert_eq!(CodedValue::Float(2.5).canonical(), "2.5");
  }

  #[test]
  fn table_matches_across_representations() {
    let table: LabelTable = [("1", "Male"), ("2", "Female")].into_iter().collect();

    assert_eq!(table.lookup(&CodedValue::Int(1)), Some("Male"));
    assert_eq!(table.lookup(&CodedValue::Float(2.0)), Some("Female"));
    assert_eq!(table.lookup(&CodedValue::from("1")), Some("Male"));
    assert_eq!(table.lookup_raw("2.00"), Some("Female"));
    assert_eq!(table.lookup(&CodedValue::Int(9)), None);
  }

  #[test]
  fn stored_float_codes_match_integer_probes() {
    let table: LabelTable = [("7.0", "Refused")].into_iter().collect();
    assert_eq!(table.lookup(&CodedValue::Int(7)), Some("Refused"));
  }

  #[test]
  fn first_spelling_wins() {
    let table: LabelTable = [("1", "One"), ("1.0", "Uno")].into_iter().collect();
    assert_eq!(table.len(), 1);
    assert_eq!(table.lookup_raw("1"), Some("One"));
  }

  #[test]
  fn decode_miss_returns_original() {
    let table = LabelTable::new();
    let decoded = table.decode(CodedValue::Int(1));
    assert_eq!(decoded, Decoded::Raw(CodedValue::Int(1)));
    assert_eq!(decoded.into_text(), "1");
  }

  #[test]
  fn untagged_json_shapes() {
    let v: CodedValue = serde_json::from_str("1").unwrap();
    assert_eq!(v, CodedValue::Int(1));
    let v: CodedValue = serde_json::from_str("\"1\"").unwrap();
    assert_eq!(v, CodedValue::from("1"));
    let v: CodedValue = serde_json::from_str("1.5").unwrap();
    assert_eq!(v, CodedValue::Float(1.5));
  }
}
