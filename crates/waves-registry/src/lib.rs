//! Store-backed services over the Waves metadata registry.
//!
//! - [`MetadataLoader`] drives one year (or a batch of years) from a codebook
//!   into a [`MetadataStore`](waves_core::store::MetadataStore).
//! - [`HarmonizationIndex`] answers "which years carry this variable".
//! - [`DecodeService`] turns coded values into labels, one value at a time or
//!   a whole `DataFrame` column at once.
//!
//! All three hold an `Arc` of the same store handle and never cache it.

mod decode;
mod index;
mod loader;

pub mod error;

pub use decode::{DecodeService, VariableMatch, decode_series};
pub use error::{Error, Result};
pub use index::HarmonizationIndex;
pub use loader::{BatchSummary, LoadReport, LoadStage, MetadataLoader, YearFailure};

#[cfg(test)]
mod tests;
