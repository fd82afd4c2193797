//! The corpus store: one immutable snapshot, atomically replaceable.
//!
//! Readers grab an [`Arc<Snapshot>`] handle and iterate it without any
//! lock; publication swaps the pointer under a write lock held only for
//! the swap itself. A handle obtained before a publish keeps observing its
//! snapshot in full until dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::entity::{Entity, SourceList};

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Per-source refresh metadata carried by a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ListStats {
  pub source:     SourceList,
  pub count:      usize,
  /// SHA-256 over the raw source files, hex encoded.
  pub hash:       String,
  pub started_at: DateTime<Utc>,
  pub ended_at:   DateTime<Utc>,
}

/// An immutable, fully normalized view of the corpus.
///
/// Entities are shared behind an `Arc` so a timings-only republish (no
/// source content changed) does not copy the corpus.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  pub entities: Arc<Vec<Entity>>,
  pub lists:    Vec<ListStats>,
  /// Version of the service that produced this snapshot.
  pub version:  String,
}

impl Snapshot {
  pub fn new(
    entities: Vec<Entity>,
    lists: Vec<ListStats>,
    version: impl Into<String>,
  ) -> Self {
    Snapshot {
      entities: Arc::new(entities),
      lists,
      version: version.into(),
    }
  }

  pub fn stats(&self, source: SourceList) -> Option<&ListStats> {
    self.lists.iter().find(|s| s.source == source)
  }

  /// When the given source finished refreshing, for tie-breaking.
  pub fn refreshed_at(&self, source: SourceList) -> Option<DateTime<Utc>> {
    self.stats(source).map(|s| s.ended_at)
  }

  /// Earliest refresh start across sources.
  pub fn started_at(&self) -> Option<DateTime<Utc>> {
    self.lists.iter().map(|s| s.started_at).min()
  }

  /// Latest refresh end across sources.
  pub fn ended_at(&self) -> Option<DateTime<Utc>> {
    self.lists.iter().map(|s| s.ended_at).max()
  }
}

// ─── Corpus ──────────────────────────────────────────────────────────────────

/// Holder of the current snapshot. The lock guards only the pointer swap;
/// no reader holds it while scanning.
#[derive(Debug, Default)]
pub struct Corpus {
  current: RwLock<Arc<Snapshot>>,
}

impl Corpus {
  pub fn new() -> Self {
    Corpus::default()
  }

  /// The current snapshot. The handle stays valid (and unchanged) across
  /// any number of subsequent publishes.
  pub fn snapshot(&self) -> Arc<Snapshot> {
    self.current.read().clone()
  }

  /// Atomically replace the current snapshot.
  pub fn publish(&self, snapshot: Snapshot) {
    *self.current.write() = Arc::new(snapshot);
  }
}
