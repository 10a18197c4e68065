//! The `MetadataStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `waves-store-sqlite`).
//! The loader, the harmonization index, the decode service, and the API all
//! depend on this abstraction and receive a store handle explicitly.

use std::{
  collections::{BTreeMap, BTreeSet},
  future::Future,
};

use crate::metadata::{
  LoadCounts, LoadMode, ValueLabel, VariableDefinition, YearMetadata, YearSummary,
};

// ─── Error contract ──────────────────────────────────────────────────────────

/// Implemented by backend error types so callers can get a metadata
/// rejection back out of a storage error.
pub trait StoreError: std::error::Error + Send + Sync + Sized + 'static {
  /// `Ok` if this error is a [`crate::Error`] raised by the load contract
  /// (orphans, duplicates, ...); `Err(self)` for genuine backend failures.
  fn into_rejection(self) -> Result<crate::Error, Self>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the variable registry and value-label store.
///
/// Writes happen only through [`MetadataStore::load_year`], which must be
/// all-or-nothing: readers never observe a half-replaced year. Every read is
/// side-effect free, and absence is reported as `None` or an empty collection,
/// never as an error.
pub trait MetadataStore: Send + Sync {
  type Error: StoreError;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Write one year's metadata under `mode`.
  ///
  /// - `Replace`: existing rows for `metadata.year` are deleted and the new
  ///   rows inserted, in one atomic unit.
  /// - `Append`: fails with [`crate::Error::DuplicateMetadata`] naming every
  ///   variable that already exists for the year; nothing is written.
  ///
  /// In both modes the batch is checked with [`YearMetadata::validate`]
  /// first, so an orphaned label aborts the call with zero rows written.
  fn load_year(
    &self,
    metadata: YearMetadata,
    mode: LoadMode,
  ) -> impl Future<Output = Result<LoadCounts, Self::Error>> + Send + '_;

  // ── Point reads ───────────────────────────────────────────────────────

  /// A variable's definition for one year.
  fn get_variable<'a>(
    &'a self,
    name: &'a str,
    year: i32,
  ) -> impl Future<Output = Result<Option<VariableDefinition>, Self::Error>> + Send + 'a;

  /// Every stored value label for `(name, year)`, in codebook order.
  fn get_value_labels<'a>(
    &'a self,
    name: &'a str,
    year: i32,
  ) -> impl Future<Output = Result<Vec<ValueLabel>, Self::Error>> + Send + 'a;

  /// All definitions of `name`, one per year it appears in, oldest first.
  fn variable_history<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<VariableDefinition>, Self::Error>> + Send + 'a;

  // ── Year-level reads ──────────────────────────────────────────────────

  /// Years holding a definition of `name`. Exact, case-sensitive match.
  fn years_present<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<BTreeSet<i32>, Self::Error>> + Send + 'a;

  /// Every distinct variable name with the years it appears in.
  fn variable_years(
    &self,
  ) -> impl Future<Output = Result<BTreeMap<String, BTreeSet<i32>>, Self::Error>> + Send + '_;

  /// Years with at least one variable definition.
  fn loaded_years(&self) -> impl Future<Output = Result<BTreeSet<i32>, Self::Error>> + Send + '_;

  /// Counts and load provenance per year, oldest first.
  fn year_summaries(
    &self,
  ) -> impl Future<Output = Result<Vec<YearSummary>, Self::Error>> + Send + '_;

  // ── Search ────────────────────────────────────────────────────────────

  /// Definitions whose name or label contains `keyword`, case-insensitively.
  /// An empty keyword matches everything. `year` restricts to one year.
  fn search_variables<'a>(
    &'a self,
    keyword: &'a str,
    year: Option<i32>,
  ) -> impl Future<Output = Result<Vec<VariableDefinition>, Self::Error>> + Send + 'a;
}
