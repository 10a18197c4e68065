//! Handlers for `GET /search` and `GET /common`.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use waves_core::store::MetadataStore;
use waves_registry::VariableMatch;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  /// Substring of a name or label; case-insensitive. Omitted lists all.
  pub q:    Option<String>,
  pub year: Option<i32>,
}

/// `GET /search[?q=...][&year=...]`
pub async fn handler<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<VariableMatch>>, ApiError>
where
  S: MetadataStore,
{
  let keyword = params.q.unwrap_or_default();
  let matches = state
    .decode
    .search_variables(&keyword, params.year)
    .await?;
  Ok(Json(matches))
}

#[derive(Debug, Deserialize)]
pub struct CommonParams {
  pub min_years: usize,
}

/// `GET /common?min_years=<n>`
pub async fn common<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<CommonParams>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: MetadataStore,
{
  let names = state.index.common_variables(params.min_years).await?;
  Ok(Json(names))
}
