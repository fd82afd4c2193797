//! Handler for `GET /v2/search`.
//!
//! Query parameters map onto the query entity and search options via
//! [`watchman_core::params::decode`]; the query is normalized exactly
//! like corpus entities before scoring.

use std::time::Instant;

use axum::{
  Json,
  extract::{Query, State},
};
use watchman_core::{params, search};

use crate::{AppState, error::ApiError};

/// `GET /v2/search?type=person&name=...[&limit=...][&minMatch=...][&debug=yes]`
pub async fn handler(
  State(state): State<AppState>,
  Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<search::SearchResponse>, ApiError> {
  let (entity, mut opts) = params::decode(&pairs)?;
  let entity = entity.normalize();

  // Past the budget the engine returns whatever it has; debug responses
  // carry the partial flag.
  opts.deadline = Some(Instant::now() + state.search_timeout);
  opts.partial_results = true;

  let snapshot = state.corpus.snapshot();
  let response = search::search(&snapshot, &entity, &opts, &state.weights)?;
  Ok(Json(response))
}
