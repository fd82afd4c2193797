//! JSON HTTP API for the watchman screener.
//!
//! Exposes an axum [`Router`] over a shared
//! [`watchman_core::corpus::Corpus`]. Refresh scheduling, TLS, auth, and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = watchman_api::api_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod ingest;
pub mod listinfo;
pub mod search;

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use watchman_core::{corpus::Corpus, search::ScoreWeights};

pub use error::ApiError;

/// Shared state threaded through all handlers.
#[derive(Clone)]
pub struct AppState {
  pub corpus:         Arc<Corpus>,
  pub weights:        Arc<ScoreWeights>,
  /// Per-request search budget; past it the engine returns best-effort
  /// results.
  pub search_timeout: Duration,
}

impl AppState {
  pub fn new(corpus: Arc<Corpus>) -> Self {
    AppState {
      corpus,
      weights: Arc::new(ScoreWeights::default()),
      search_timeout: Duration::from_secs(5),
    }
  }
}

/// Build the `/v2` API router.
pub fn api_router(state: AppState) -> Router {
  Router::new()
    .route("/v2/search", get(search::handler))
    .route("/v2/listinfo", get(listinfo::handler))
    .route("/v2/ingest/{file_type}", post(ingest::handler))
    .with_state(state)
}
