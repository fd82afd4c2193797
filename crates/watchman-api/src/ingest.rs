//! Handler for `POST /v2/ingest/{fileType}`.
//!
//! Parses a CSV body into entities and returns them so callers can
//! preview a dataset. The corpus is never touched.

use axum::{
  Json,
  extract::{Path, State},
};
use watchman_core::params::IngestFileResponse;
use watchman_sources::ingest::parse_file;

use crate::{AppState, error::ApiError};

pub async fn handler(
  State(_state): State<AppState>,
  Path(file_type): Path<String>,
  body: String,
) -> Result<Json<IngestFileResponse>, ApiError> {
  let entities = parse_file(&file_type, body.as_bytes())?;
  tracing::info!(
    file_type,
    count = entities.len(),
    "parsed ingest preview"
  );
  Ok(Json(IngestFileResponse { file_type, entities }))
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use watchman_core::{corpus::Corpus, entity::EntityKind};

  use super::*;

  fn state() -> AppState {
    AppState::new(Arc::new(Corpus::new()))
  }

  #[tokio::test]
  async fn previews_a_person_file() {
    let body = "name,birthDate\n\"Juan Perez\",1970-02-14\n".to_string();
    let Json(resp) = handler(
      State(state()),
      Path("person".to_string()),
      body,
    )
    .await
    .unwrap();

    assert_eq!(resp.file_type, "person");
    assert_eq!(resp.entities.len(), 1);
    assert_eq!(resp.entities[0].kind, EntityKind::Person);
  }

  #[tokio::test]
  async fn unknown_file_type_is_a_bad_request() {
    let err = handler(
      State(state()),
      Path("starship".to_string()),
      "name\nX\n".to_string(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
  }
}
