//! Plain-text rendering of command results.

use waves_core::{codes::Decoded, harmonize::HarmonizationRecord, metadata::YearSummary};
use waves_registry::{BatchSummary, VariableMatch};

pub fn batch(summary: &BatchSummary) {
  for r in &summary.succeeded {
    println!(
      "{}  ok      {:>6} variables {:>7} labels  ({}, {})",
      r.year, r.variables_inserted, r.labels_inserted, r.mode, r.source
    );
  }
  for f in &summary.failed {
    println!("{}  FAILED  {}", f.year, f.error);
  }
  println!(
    "{} loaded, {} failed; {} variables, {} labels",
    summary.succeeded.len(),
    summary.failed.len(),
    summary.total_variables(),
    summary.total_labels()
  );
}

pub fn matches(rows: &[VariableMatch]) {
  if rows.is_empty() {
    println!("no matching variables");
    return;
  }
  let width = name_width(rows.iter().map(|m| m.variable_name.as_str()));
  for m in rows {
    println!(
      "{:<width$}  {:<24}  {}",
      m.variable_name,
      m.availability.as_deref().unwrap_or("-"),
      m.label.as_deref().unwrap_or("")
    );
  }
}

pub fn records(rows: &[HarmonizationRecord]) {
  let width = name_width(rows.iter().map(|r| r.variable_name.as_str()));
  for r in rows {
    println!(
      "{:<width$}  {:>2}  {}",
      r.variable_name,
      r.year_count(),
      r.availability_label
    );
  }
}

pub fn decoded(name: &str, year: i32, value: &Decoded) {
  let note = if value.is_label() { "" } else { "  (no label)" };
  println!("{name} [{year}]: {value}{note}");
}

pub fn years(rows: &[YearSummary]) {
  if rows.is_empty() {
    println!("no years loaded");
    return;
  }
  for y in rows {
    println!(
      "{}  {:>6} variables {:>7} labels  {:<7}  {}  {}",
      y.year,
      y.variables,
      y.value_labels,
      y.mode.as_ref(),
      y.loaded_at.format("%Y-%m-%d %H:%M"),
      y.source.as_deref().unwrap_or("-")
    );
  }
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
  names.map(str::len).max().unwrap_or(0).max(8)
}
