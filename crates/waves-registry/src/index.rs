//! Store-backed harmonization queries.

use std::{collections::BTreeSet, sync::Arc};

use waves_core::{
  harmonize::{HarmonizationRecord, YearSpan},
  store::MetadataStore,
};

use crate::{Error, Result};

/// Answers cross-year presence questions from the variable registry.
///
/// The "full year range" for availability labels is the span of years
/// actually loaded, unless one is fixed with [`HarmonizationIndex::with_span`].
pub struct HarmonizationIndex<S> {
  store: Arc<S>,
  span:  Option<YearSpan>,
}

impl<S> Clone for HarmonizationIndex<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      span:  self.span,
    }
  }
}

impl<S: MetadataStore> HarmonizationIndex<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, span: None } }

  /// Fix the known year range instead of deriving it from loaded years.
  pub fn with_span(mut self, span: YearSpan) -> Self {
    self.span = Some(span);
    self
  }

  /// Years holding a definition of exactly `name`.
  pub async fn years_present(&self, name: &str) -> Result<BTreeSet<i32>> {
    self
      .store
      .years_present(name)
      .await
      .map_err(Error::from_store)
  }

  /// The configured span, or the smallest span covering every loaded year.
  /// `None` only when nothing is loaded and no span is configured.
  pub async fn known_span(&self) -> Result<Option<YearSpan>> {
    if let Some(span) = self.span {
      return Ok(Some(span));
    }
    let loaded = self
      .store
      .loaded_years()
      .await
      .map_err(Error::from_store)?;
    Ok(YearSpan::covering(loaded))
  }

  /// Render `name`'s presence against `span`.
  ///
  /// Asking about a name with no definitions is a caller error
  /// ([`waves_core::Error::UnknownVariable`]).
  pub async fn availability_label(&self, name: &str, span: YearSpan) -> Result<String> {
    let years = self.years_present(name).await?;
    Ok(HarmonizationRecord::build(name, years, span)?.availability_label)
  }

  /// `name`'s harmonization record against the known span, or `None` if the
  /// name is not in the registry.
  pub async fn record(&self, name: &str) -> Result<Option<HarmonizationRecord>> {
    let years = self.years_present(name).await?;
    if years.is_empty() {
      return Ok(None);
    }
    let Some(span) = self.known_span().await? else {
      return Ok(None);
    };
    Ok(Some(HarmonizationRecord::build(name, years, span)?))
  }

  /// One record per distinct variable name, sorted by name.
  pub async fn records(&self) -> Result<Vec<HarmonizationRecord>> {
    let Some(span) = self.known_span().await? else {
      return Ok(Vec::new());
    };
    let map = self
      .store
      .variable_years()
      .await
      .map_err(Error::from_store)?;
    map
      .into_iter()
      .map(|(name, years)| HarmonizationRecord::build(name, years, span).map_err(Error::from))
      .collect()
  }

  /// Names present in at least `min_years` years, sorted.
  pub async fn common_variables(&self, min_years: usize) -> Result<Vec<String>> {
    let map = self
      .store
      .variable_years()
      .await
      .map_err(Error::from_store)?;
    Ok(
      map
        .into_iter()
        .filter(|(_, years)| years.len() >= min_years)
        .map(|(name, _)| name)
        .collect(),
    )
  }
}
