//! Cross-year availability rules.
//!
//! Harmonization here means literal name identity: `BedTime_16` and
//! `BEDTIME` are two variables. The functions in this module are pure; the
//! store-backed index lives in `waves-registry`.

use std::{collections::BTreeSet, fmt, ops::RangeInclusive};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── YearSpan ────────────────────────────────────────────────────────────────

/// The inclusive range of survey years considered "all years".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSpan {
  first: i32,
  last:  i32,
}

impl YearSpan {
  pub fn new(first: i32, last: i32) -> Result<Self> {
    if first > last {
      return Err(Error::InvalidYearSpan { first, last });
    }
    Ok(Self { first, last })
  }

  /// The smallest span covering every year in `years`, or `None` if empty.
  pub fn covering(years: impl IntoIterator<Item = i32>) -> Option<Self> {
    let mut iter = years.into_iter();
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y)));
    Some(Self { first: min, last: max })
  }

  pub fn first(&self) -> i32 { self.first }

  pub fn last(&self) -> i32 { self.last }

  pub fn len(&self) -> usize {
    usize::try_from(self.last.abs_diff(self.first))
      .map_or(usize::MAX, |gap| gap.saturating_add(1))
  }

  /// A span always holds at least one year.
  pub fn is_empty(&self) -> bool { false }

  pub fn contains(&self, year: i32) -> bool { (self.first..=self.last).contains(&year) }

  pub fn years(&self) -> RangeInclusive<i32> { self.first..=self.last }
}

impl fmt::Display for YearSpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.first, self.last)
  }
}

// ─── Availability label ──────────────────────────────────────────────────────

/// Render the years a variable appears in, relative to the full `span`.
///
/// Rules, applied in order:
/// 1. no years: no label (`None`)
/// 2. a single year: that year, literally
/// 3. every year of `span`: `"All (<first>-<last>)"`
/// 4. a gap-free run touching either end of `span`:
///    `"<min>-<max> (<n> years)"`
/// 5. anything else: the years joined with `", "`
pub fn availability_label(years: &BTreeSet<i32>, span: YearSpan) -> Option<String> {
  let (&min, &max) = (years.first()?, years.last()?);

  if years.len() == 1 {
    return Some(min.to_string());
  }

  if years.len() == span.len() && min == span.first() && max == span.last() {
    return Some(format!("All ({span})"));
  }

  let contiguous = u64::from(max.abs_diff(min)) + 1 == years.len() as u64;
  if contiguous && (min == span.first() || max == span.last()) {
    return Some(format!("{min}-{max} ({} years)", years.len()));
  }

  Some(
    years
      .iter()
      .map(i32::to_string)
      .collect::<Vec<_>>()
      .join(", "),
  )
}

// ─── HarmonizationRecord ─────────────────────────────────────────────────────

/// Where one variable name appears across survey years. Derived on demand,
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonizationRecord {
  pub variable_name:      String,
  pub years_present:      BTreeSet<i32>,
  pub availability_label: String,
}

impl HarmonizationRecord {
  /// Fails with [`Error::UnknownVariable`] when `years_present` is empty.
  pub fn build(
    variable_name: impl Into<String>,
    years_present: BTreeSet<i32>,
    span: YearSpan,
  ) -> Result<Self> {
    let variable_name = variable_name.into();
    let Some(availability_label) = availability_label(&years_present, span) else {
      return Err(Error::UnknownVariable(variable_name));
    };
    Ok(Self {
      variable_name,
      years_present,
      availability_label,
    })
  }

  pub fn year_count(&self) -> usize { self.years_present.len() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn span() -> YearSpan { YearSpan::new(2016, 2023).unwrap() }

  fn years(ys: &[i32]) -> BTreeSet<i32> { ys.iter().copied().collect() }

  #[test]
  fn full_span_is_all() {
    let ys: BTreeSet<i32> = (2016..=2023).collect();
    assert_eq!(availability_label(&ys, span()).unwrap(), "All (2016-2023)");
  }

  #[test]
  fn trailing_run_counts_years() {
    let ys: BTreeSet<i32> = (2017..=2023).collect();
    assert_eq!(
      availability_label(&ys, span()).unwrap(),
      "2017-2023 (7 years)"
    );
  }

  #[test]
  fn leading_run_counts_years() {
    assert_eq!(
      availability_label(&years(&[2016, 2017, 2018]), span()).unwrap(),
      "2016-2018 (3 years)"
    );
  }

  #[test]
  fn gaps_list_years() {
    assert_eq!(
      availability_label(&years(&[2016, 2020, 2023]), span()).unwrap(),
      "2016, 2020, 2023"
    );
  }

  #[test]
  fn interior_run_lists_years() {
    assert_eq!(
      availability_label(&years(&[2018, 2019, 2020]), span()).unwrap(),
      "2018, 2019, 2020"
    );
  }

  #[test]
  fn single_year_is_literal() {
    assert_eq!(availability_label(&years(&[2023]), span()).unwrap(), "2023");
    assert_eq!(availability_label(&years(&[2016]), span()).unwrap(), "2016");
    let one = YearSpan::new(2023, 2023).unwrap();
    assert_eq!(availability_label(&years(&[2023]), one).unwrap(), "2023");
  }

  #[test]
  fn empty_has_no_label() {
    assert_eq!(availability_label(&BTreeSet::new(), span()), None);
    assert!(matches!(
      HarmonizationRecord::build("X", BTreeSet::new(), span()),
      Err(Error::UnknownVariable(name)) if name == "X"
    ));
  }

  #[test]
  fn extreme_years_do_not_overflow() {
    let wide = YearSpan::new(i32::MIN, i32::MAX).unwrap();
    assert_eq!(wide.len() as u64, u64::from(u32::MAX) + 1);
    assert_eq!(
      availability_label(&years(&[i32::MIN, i32::MAX]), wide).unwrap(),
      format!("{}, {}", i32::MIN, i32::MAX)
    );
    assert_eq!(
      availability_label(&years(&[i32::MAX - 1, i32::MAX]), wide).unwrap(),
      format!("{}-{} (2 years)", i32::MAX - 1, i32::MAX)
    );
  }

  #[test]
  fn labels_are_deterministic() {
    let ys = years(&[2016, 2020, 2023]);
    let a = availability_label(&ys, span());
    let b = availability_label(&ys.clone(), span());
    assert_eq!(a, b);
  }

  #[test]
  fn span_helpers() {
    assert!(YearSpan::new(2023, 2016).is_err());
    assert_eq!(span().len(), 8);
    assert!(span().contains(2020));
    assert!(!span().contains(2024));
    assert_eq!(YearSpan::covering([2019, 2016, 2023]), Some(span()));
    assert_eq!(YearSpan::covering(std::iter::empty()), None);
  }
}
