//! The per-year load state machine and the sequential batch driver.
//!
//! ```text
//! PARSE ─▶ VALIDATE-ORPHANS ─▶ REPLACE | APPEND ─▶ REPORT
//!   │             │                    │
//!   └─────────────┴────────────────────┴──▶ FAILED
//! ```
//!
//! Only the `REPLACE | APPEND` stage touches the store, and it commits
//! atomically, so a year that ends in `FAILED` leaves the registry as it was.

use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use tracing::{Instrument as _, debug, info, info_span, warn};
use waves_codebook::CodebookSource;
use waves_core::{metadata::LoadMode, store::MetadataStore};

use crate::{Error, Result};

// ─── Types ───────────────────────────────────────────────────────────────────

/// The states a single year's load moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
#[strum(serialize_all = "SCREAMING-KEBAB-CASE")]
pub enum LoadStage {
  Parse,
  ValidateOrphans,
  Replace,
  Append,
  Report,
  Failed,
}

impl LoadStage {
  fn for_mode(mode: LoadMode) -> Self {
    match mode {
      LoadMode::Replace => Self::Replace,
      LoadMode::Append => Self::Append,
    }
  }
}

/// What a committed year load wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
  pub year:               i32,
  pub mode:               LoadMode,
  pub source:             String,
  pub variables_inserted: usize,
  pub labels_inserted:    usize,
}

/// A year that ended in `FAILED`.
#[derive(Debug)]
pub struct YearFailure {
  pub year:  i32,
  pub error: Error,
}

/// Per-year outcomes of [`MetadataLoader::load_batch`], in input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
  pub succeeded: Vec<LoadReport>,
  pub failed:    Vec<YearFailure>,
}

impl BatchSummary {
  pub fn is_success(&self) -> bool { self.failed.is_empty() }

  pub fn total_variables(&self) -> usize {
    self.succeeded.iter().map(|r| r.variables_inserted).sum()
  }

  pub fn total_labels(&self) -> usize { self.succeeded.iter().map(|r| r.labels_inserted).sum() }
}

// ─── Loader ──────────────────────────────────────────────────────────────────

/// Moves codebooks into a [`MetadataStore`], one year at a time.
pub struct MetadataLoader<S> {
  store: Arc<S>,
}

impl<S> Clone for MetadataLoader<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: MetadataStore> MetadataLoader<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Parse `source` and write it as `year` under `mode`.
  ///
  /// Any of the three load rejections comes back as [`Error::Metadata`] with
  /// the year attached; the store is untouched in that case.
  pub async fn load_year<C>(&self, year: i32, source: &C, mode: LoadMode) -> Result<LoadReport>
  where
    C: CodebookSource + ?Sized,
  {
    let span = info_span!("load_year", year, %mode);
    self.run(year, source, mode).instrument(span).await
  }

  async fn run<C>(&self, year: i32, source: &C, mode: LoadMode) -> Result<LoadReport>
  where
    C: CodebookSource + ?Sized,
  {
    let described = source.describe();

    enter(LoadStage::Parse);
    let metadata = match waves_codebook::parse_source(source) {
      Ok(parsed) => parsed.into_year(year, Some(described.clone())),
      Err(e) => {
        return Err(failed(
          waves_core::Error::MetadataExtraction {
            year,
            reason: e.to_string(),
          }
          .into(),
        ));
      }
    };
    debug!(
      variables = metadata.variables.len(),
      labels = metadata.value_labels.len(),
      "codebook parsed"
    );

    enter(LoadStage::ValidateOrphans);
    if let Err(e) = metadata.validate() {
      return Err(failed(e.into()));
    }

    enter(LoadStage::for_mode(mode));
    let counts = self
      .store
      .load_year(metadata, mode)
      .await
      .map_err(|e| failed(Error::from_store(e)))?;

    enter(LoadStage::Report);
    info!(
      source = %described,
      variables = counts.variables_inserted,
      labels = counts.labels_inserted,
      "year loaded"
    );

    Ok(LoadReport {
      year,
      mode,
      source: described,
      variables_inserted: counts.variables_inserted,
      labels_inserted: counts.labels_inserted,
    })
  }

  /// Load several years one after another, continuing past failures.
  pub async fn load_batch<I, C>(&self, sources: I, mode: LoadMode) -> BatchSummary
  where
    I: IntoIterator<Item = (i32, C)>,
    C: CodebookSource,
  {
    let mut summary = BatchSummary::default();
    for (year, source) in sources {
      match self.load_year(year, &source, mode).await {
        Ok(report) => summary.succeeded.push(report),
        Err(error) => summary.failed.push(YearFailure { year, error }),
      }
    }
    info!(
      succeeded = summary.succeeded.len(),
      failed = summary.failed.len(),
      "batch finished"
    );
    summary
  }
}

fn enter(stage: LoadStage) {
  debug!(%stage, "entering stage");
}

fn failed(error: Error) -> Error {
  warn!(stage = %LoadStage::Failed, %error, "year load failed");
  error
}
