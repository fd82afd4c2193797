//! Handler for `GET /v2/listinfo`.

use axum::{Json, extract::State};
use watchman_core::params::ListInfoResponse;

use crate::AppState;

/// Report counts, content hashes, and timings of the current snapshot.
pub async fn handler(State(state): State<AppState>) -> Json<ListInfoResponse> {
  let snapshot = state.corpus.snapshot();

  let mut info = ListInfoResponse {
    started_at: snapshot.started_at(),
    ended_at: snapshot.ended_at(),
    version: snapshot.version.clone(),
    ..ListInfoResponse::default()
  };
  for stats in &snapshot.lists {
    info.lists.insert(stats.source.to_string(), stats.count);
    info
      .list_hashes
      .insert(stats.source.to_string(), stats.hash.clone());
  }

  Json(info)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use watchman_core::{
    corpus::{Corpus, ListStats, Snapshot},
    entity::SourceList,
  };

  use super::*;

  #[tokio::test]
  async fn reports_the_current_snapshot() {
    let corpus = Arc::new(Corpus::new());
    let now = chrono::Utc::now();
    corpus.publish(Snapshot::new(
      vec![],
      vec![
        ListStats {
          source: SourceList::UsOfac,
          count: 17_000,
          hash: "abc123".into(),
          started_at: now,
          ended_at: now,
        },
        ListStats {
          source: SourceList::EuCsl,
          count: 4_200,
          hash: "def456".into(),
          started_at: now,
          ended_at: now,
        },
      ],
      "1.2.3",
    ));

    let Json(info) = handler(State(AppState::new(corpus))).await;
    assert_eq!(info.lists["us_ofac"], 17_000);
    assert_eq!(info.list_hashes["eu_csl"], "def456");
    assert_eq!(info.version, "1.2.3");
    assert!(info.started_at.is_some());
  }

  #[tokio::test]
  async fn empty_corpus_reports_empty_lists() {
    let Json(info) =
      handler(State(AppState::new(Arc::new(Corpus::new())))).await;
    assert!(info.lists.is_empty());
    assert!(info.started_at.is_none());
  }
}
