//! Handler for `GET /years`: per-year counts and load provenance.

use axum::{Json, extract::State};
use waves_core::{metadata::YearSummary, store::MetadataStore};

use crate::{ApiState, error::ApiError};

/// `GET /years`
pub async fn list<S>(State(state): State<ApiState<S>>) -> Result<Json<Vec<YearSummary>>, ApiError>
where
  S: MetadataStore,
{
  let years = state
    .store
    .year_summaries()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(years))
}
