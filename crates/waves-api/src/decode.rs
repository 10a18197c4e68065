//! Handler for `GET /decode`.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use waves_core::{
  codes::{CodedValue, Decoded},
  store::MetadataStore,
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct DecodeParams {
  pub variable: String,
  pub year:     i32,
  /// Taken as text; `1`, `1.0` and `01` all find the label for code 1.
  pub value:    String,
}

#[derive(Debug, Serialize)]
pub struct DecodeResponse {
  pub variable: String,
  pub year:     i32,
  pub decoded:  Decoded,
  /// The label, or the original value when there is none.
  pub text:     String,
}

/// `GET /decode?variable=<name>&year=<year>&value=<code>`
///
/// A value without a label is not an error; `decoded.kind` is `"raw"`.
pub async fn handler<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<DecodeParams>,
) -> Result<Json<DecodeResponse>, ApiError>
where
  S: MetadataStore,
{
  let decoded = state
    .decode
    .decode_value(&params.variable, params.year, CodedValue::Text(params.value))
    .await?;
  Ok(Json(DecodeResponse {
    variable: params.variable,
    year: params.year,
    text: decoded.to_string(),
    decoded,
  }))
}
