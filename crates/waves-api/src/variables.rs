//! Handlers for `/variables` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/variables/{name}` | 404 if the name is in no loaded year |
//! | `GET`  | `/variables/{name}/labels` | Requires `?year=`; empty list if absent |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use waves_core::{
  harmonize::HarmonizationRecord,
  metadata::{ValueLabel, VariableDefinition},
  store::MetadataStore,
};

use crate::{ApiState, error::ApiError};

// ─── Get one ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct VariableDetail {
  pub variable_name: String,
  /// One definition per year, oldest first.
  pub definitions:   Vec<VariableDefinition>,
  pub harmonization: HarmonizationRecord,
}

/// `GET /variables/{name}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(name): Path<String>,
) -> Result<Json<VariableDetail>, ApiError>
where
  S: MetadataStore,
{
  let definitions = state
    .store
    .variable_history(&name)
    .await
    .map_err(ApiError::store)?;
  let harmonization = state
    .index
    .record(&name)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("variable {name} not found")))?;

  Ok(Json(VariableDetail {
    variable_name: name,
    definitions,
    harmonization,
  }))
}

// ─── Labels ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LabelsParams {
  pub year: i32,
}

/// `GET /variables/{name}/labels?year=<year>`
pub async fn labels<S>(
  State(state): State<ApiState<S>>,
  Path(name): Path<String>,
  Query(params): Query<LabelsParams>,
) -> Result<Json<Vec<ValueLabel>>, ApiError>
where
  S: MetadataStore,
{
  let labels = state
    .store
    .get_value_labels(&name, params.year)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(labels))
}
