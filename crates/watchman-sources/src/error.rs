//! Error types for `watchman-sources`.

use thiserror::Error;
use watchman_core::entity::SourceList;

#[derive(Debug, Error)]
pub enum Error {
  #[error("fetching {name}: {source}")]
  Fetch {
    name:   String,
    #[source]
    source: reqwest::Error,
  },

  #[error("fetching {name}: HTTP {status}")]
  FetchStatus { name: String, status: u16 },

  #[error("reading {name}: {source}")]
  Io {
    name:   String,
    #[source]
    source: std::io::Error,
  },

  #[error("{file}: {detail}")]
  MalformedFile { file: String, detail: String },

  #[error("refresh of {0} timed out")]
  SourceTimeout(SourceList),

  #[error("{0} is not a refreshable source")]
  NotASource(SourceList),

  #[error("unknown ingest file type: {0:?}")]
  UnknownFileType(String),

  #[error(transparent)]
  Core(#[from] watchman_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
