//! Coded value → label resolution.
//!
//! Decoding is advisory: a value with no label comes back unchanged and is
//! logged, never raised. Only a failing store is an error.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use waves_core::{
  codes::{CodedValue, Decoded, LabelTable},
  harmonize::{YearSpan, availability_label},
  metadata::VariableDefinition,
  store::MetadataStore,
};

use crate::{Error, HarmonizationIndex, Result};

/// One row of [`DecodeService::search_variables`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableMatch {
  pub variable_name: String,
  /// Label from the latest matching year.
  pub label:         Option<String>,
  /// The year `label` was taken from.
  pub year:          i32,
  pub years_present: BTreeSet<i32>,
  pub availability:  Option<String>,
}

pub struct DecodeService<S> {
  store: Arc<S>,
  index: HarmonizationIndex<S>,
}

impl<S> Clone for DecodeService<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      index: self.index.clone(),
    }
  }
}

impl<S: MetadataStore> DecodeService<S> {
  pub fn new(store: Arc<S>) -> Self {
    let index = HarmonizationIndex::new(Arc::clone(&store));
    Self { store, index }
  }

  /// Fix the year range used for availability in search results.
  pub fn with_span(mut self, span: YearSpan) -> Self {
    self.index = self.index.with_span(span);
    self
  }

  pub fn index(&self) -> &HarmonizationIndex<S> { &self.index }

  /// The labels of `(name, year)` keyed by canonical code. Empty when the
  /// variable or year is absent.
  pub async fn label_table(&self, name: &str, year: i32) -> Result<LabelTable> {
    let labels = self
      .store
      .get_value_labels(name, year)
      .await
      .map_err(Error::from_store)?;
    Ok(
      labels
        .iter()
        .map(|l| (l.coded_value.as_str(), l.label_text.as_str()))
        .collect(),
    )
  }

  /// Resolve one coded value. `1`, `1.0` and `"1"` all probe the same label.
  pub async fn decode_value(
    &self,
    name: &str,
    year: i32,
    value: impl Into<CodedValue>,
  ) -> Result<Decoded> {
    let value = value.into();
    let table = self.label_table(name, year).await?;
    let decoded = table.decode(value);
    if let Decoded::Raw(ref raw) = decoded {
      warn!(variable = name, year, value = %raw, "no value label; keeping raw code");
    }
    Ok(decoded)
  }

  /// Add a `<column>_label` column for each of `columns`.
  ///
  /// Each label table is fetched once and probed per row. Cells without a
  /// label keep their original text; nulls stay null. The coded columns are
  /// left as they are. An existing `<column>_label` is overwritten.
  pub async fn decode_columns(
    &self,
    mut df: DataFrame,
    columns: &[&str],
    year: i32,
  ) -> Result<DataFrame> {
    for &name in columns {
      if !df.get_column_names().iter().any(|c| c.as_str() == name) {
        return Err(Error::MissingColumn(name.to_owned()));
      }
      let table = self.label_table(name, year).await?;
      let column = df.column(name)?;
      let (labels, misses) = decode_series(column, &table, &format!("{name}_label"))?;
      if misses > 0 {
        warn!(variable = name, year, misses, "values without labels kept as raw codes");
      }
      df.with_column(labels)?;
    }
    Ok(df)
  }

  /// Case-insensitive substring search over names and labels, one row per
  /// variable name. An empty keyword lists everything.
  pub async fn search_variables(
    &self,
    keyword: &str,
    year: Option<i32>,
  ) -> Result<Vec<VariableMatch>> {
    let defs = self
      .store
      .search_variables(keyword, year)
      .await
      .map_err(Error::from_store)?;
    if defs.is_empty() {
      return Ok(Vec::new());
    }

    // Rows arrive ordered by (name, year); keep the latest per name.
    let mut latest: BTreeMap<String, VariableDefinition> = BTreeMap::new();
    for def in defs {
      latest.insert(def.variable_name.clone(), def);
    }

    let span = self.index.known_span().await?;
    let mut all_years = self
      .store
      .variable_years()
      .await
      .map_err(Error::from_store)?;
    debug!(keyword, ?year, matches = latest.len(), "search");

    Ok(
      latest
        .into_values()
        .map(|def| {
          let years_present = all_years.remove(&def.variable_name).unwrap_or_default();
          let availability = span.and_then(|s| availability_label(&years_present, s));
          VariableMatch {
            variable_name: def.variable_name,
            label: def.label,
            year: def.year,
            years_present,
            availability,
          }
        })
        .collect(),
    )
  }
}

/// Map each cell of `column` through `table`, returning the new series and
/// the number of non-null cells without a label.
pub fn decode_series(
  column: &Column,
  table: &LabelTable,
  name: &str,
) -> PolarsResult<(Series, usize)> {
  let as_text = column.cast(&DataType::String)?;
  let codes = as_text.str()?;

  let mut misses = 0;
  let decoded: Vec<Option<String>> = codes
    .iter()
    .map(|cell| {
      cell.map(|raw| match table.lookup_raw(raw) {
        Some(label) => label.to_owned(),
        None => {
          misses += 1;
          raw.to_owned()
        }
      })
    })
    .collect();

  Ok((Series::new(name.into(), decoded), misses))
}
