//! Read-only JSON API over the Waves metadata registry.
//!
//! Exposes an axum [`Router`] backed by any [`MetadataStore`]. Loading is
//! not exposed here; it stays with the CLI.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", waves_api::api_router(ApiState::new(store.clone())))
//! ```

pub mod decode;
pub mod error;
pub mod search;
pub mod variables;
pub mod years;

use std::sync::Arc;

use axum::{Router, routing::get};
use waves_core::{harmonize::YearSpan, store::MetadataStore};
use waves_registry::{DecodeService, HarmonizationIndex};

pub use error::ApiError;

/// Shared handler state: the store plus the services built over it.
pub struct ApiState<S> {
  pub store:  Arc<S>,
  pub index:  HarmonizationIndex<S>,
  pub decode: DecodeService<S>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      index:  self.index.clone(),
      decode: self.decode.clone(),
    }
  }
}

impl<S: MetadataStore> ApiState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      index: HarmonizationIndex::new(Arc::clone(&store)),
      decode: DecodeService::new(Arc::clone(&store)),
      store,
    }
  }

  /// Fix the year range used for availability labels.
  pub fn with_span(mut self, span: YearSpan) -> Self {
    self.index = self.index.with_span(span);
    self.decode = self.decode.with_span(span);
    self
  }
}

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: MetadataStore + 'static,
{
  Router::new()
    // Variables
    .route("/variables/{name}", get(variables::get_one::<S>))
    .route("/variables/{name}/labels", get(variables::labels::<S>))
    // Discovery
    .route("/search", get(search::handler::<S>))
    .route("/common", get(search::common::<S>))
    // Decode
    .route("/decode", get(decode::handler::<S>))
    // Load log
    .route("/years", get(years::list::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use serde_json::Value;
  use tower::ServiceExt as _;
  use waves_core::metadata::{LoadMode, ValueLabelRecord, VariableRecord, YearMetadata};
  use waves_store_sqlite::SqliteStore;

  use super::*;

  async fn state() -> ApiState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for year in [2016, 2017, 2023] {
      let meta = YearMetadata::new(year)
        .with_source(format!("{year}.sps"))
        .with_variable(VariableRecord::new("SEX").with_label("Sex of respondent"))
        .with_value_label(ValueLabelRecord::new("SEX", "1", "Male"))
        .with_value_label(ValueLabelRecord::new("SEX", "2", "Female"));
      store.load_year(meta, LoadMode::Replace).await.unwrap();
    }
    let extra = YearMetadata::new(2023)
      .with_variable(VariableRecord::new("BEDTIME").with_label("Usual bedtime"));
    store.load_year(extra, LoadMode::Append).await.unwrap();
    ApiState::new(Arc::new(store))
  }

  async fn get_json(state: ApiState<SqliteStore>, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = api_router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let body = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
  }

  #[tokio::test]
  async fn variable_detail() {
    let (status, body) = get_json(state().await, "/variables/SEX").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["definitions"].as_array().unwrap().len(), 3);
    assert_eq!(body["harmonization"]["availability_label"], "2016, 2017, 2023");
  }

  #[tokio::test]
  async fn unknown_variable_is_404() {
    let (status, body) = get_json(state().await, "/variables/sex").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("sex"));
  }

  #[tokio::test]
  async fn labels_for_year() {
    let (status, body) = get_json(state().await, "/variables/SEX/labels?year=2017").await;
    assert_eq!(status, StatusCode::OK);
    let labels = body.as_array().unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels[0]["label_text"], "Male");

    let (status, body) = get_json(state().await, "/variables/SEX/labels?year=1999").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = get_json(state().await, "/variables/SEX/labels").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn search_and_common() {
    let (status, body) = get_json(state().await, "/search?q=bed").await;
    assert_eq!(status, StatusCode::OK);
    let hits = body.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["variable_name"], "BEDTIME");
    assert_eq!(hits[0]["availability"], "2023");

    let (_, body) = get_json(state().await, "/search").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = get_json(state().await, "/search?q=&year=2016").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = get_json(state().await, "/common?min_years=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(["SEX"]));
  }

  #[tokio::test]
  async fn decode_values() {
    let (status, body) = get_json(state().await, "/decode?variable=SEX&year=2023&value=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decoded"]["kind"], "label");
    assert_eq!(body["decoded"]["value"], "Female");
    assert_eq!(body["text"], "Female");

    let (status, body) =
      get_json(state().await, "/decode?variable=NOPE&year=2023&value=1.0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decoded"]["kind"], "raw");
    assert_eq!(body["text"], "1.0");
  }

  #[tokio::test]
  async fn years_lists_load_log() {
    let (status, body) = get_json(state().await, "/years").await;
    assert_eq!(status, StatusCode::OK);
    let years = body.as_array().unwrap();
    assert_eq!(years.len(), 3);
    assert_eq!(years[2]["year"], 2023);
    assert_eq!(years[2]["variables"], 2);
    assert_eq!(years[2]["mode"], "append");
    assert_eq!(years[0]["source"], "2016.sps");
  }
}
