//! Error types for `watchman-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown entity type: {0:?}")]
  UnknownEntityKind(String),

  #[error("unknown source list: {0:?}")]
  UnknownSourceList(String),

  #[error("unknown government ID type: {0:?}")]
  UnknownGovernmentIdType(String),

  #[error("invalid query: {0}")]
  InvalidQuery(String),

  #[error("invalid date {value:?} for {field}")]
  InvalidDate { field: String, value: String },

  #[error("entity {source_id}: kind {kind:?} does not match populated record")]
  KindMismatch { source_id: String, kind: String },

  #[error("search cancelled before any results were collected")]
  Cancelled,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
