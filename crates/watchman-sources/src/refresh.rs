//! The refresh coordinator.
//!
//! Runs every configured source concurrently, merges the results into a
//! new snapshot, and publishes it into the shared [`Corpus`]. A source
//! that fails keeps its entities from the previous snapshot (best-effort
//! continuity); on a first refresh it contributes nothing and the service
//! comes up degraded rather than not at all.
//!
//! Publication happens only after every source has finished, so
//! cancelling an in-flight refresh (dropping the future) never leaves the
//! corpus half-loaded.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::task::JoinSet;
use watchman_core::{
  corpus::{Corpus, ListStats, Snapshot},
  entity::{Entity, SourceList},
};

use crate::{
  csl_eu, csl_uk, csl_us,
  download::FileSource,
  error::{Error, Result},
  ofac,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RefreshConfig {
  /// How often the background loop refreshes all sources.
  pub interval:       Duration,
  /// Per-source fetch+parse budget; a stuck source cannot stall the rest.
  pub source_timeout: Duration,
  /// Which lists participate. Defaults to all of them.
  pub included:       Vec<SourceList>,
  /// Stamped into each published snapshot.
  pub version:        String,
}

impl Default for RefreshConfig {
  fn default() -> Self {
    RefreshConfig {
      interval:       Duration::from_secs(24 * 60 * 60),
      source_timeout: Duration::from_secs(30),
      included:       SourceList::ALL.to_vec(),
      version:        env!("CARGO_PKG_VERSION").to_string(),
    }
  }
}

/// Outcome of one [`Refresher::refresh_all`] call.
#[derive(Debug, Clone)]
pub struct RefreshStats {
  pub lists:   Vec<ListStats>,
  pub total:   usize,
  /// Whether any source's content hash changed since the last publish.
  pub changed: bool,
}

// ─── Per-source work ─────────────────────────────────────────────────────────

struct SourceOutcome {
  entities: Vec<Entity>,
  hash:     String,
}

fn hash_of(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

async fn run_source<S: FileSource>(
  source: &S,
  list: SourceList,
) -> Result<SourceOutcome> {
  match list {
    SourceList::UsOfac => {
      let files = ofac::fetch(source).await?;
      let hash = hash_of(&files.content());
      let entities = ofac::parse(&files)?;
      Ok(SourceOutcome { entities, hash })
    }
    SourceList::UsCsl => {
      let raw = csl_us::fetch(source).await?;
      let hash = hash_of(&raw);
      Ok(SourceOutcome { entities: csl_us::parse(&raw)?, hash })
    }
    SourceList::EuCsl => {
      let raw = csl_eu::fetch(source).await?;
      let hash = hash_of(&raw);
      Ok(SourceOutcome { entities: csl_eu::parse(&raw)?, hash })
    }
    SourceList::UkCsl => {
      let raw = csl_uk::fetch(source).await?;
      let hash = hash_of(&raw);
      Ok(SourceOutcome { entities: csl_uk::parse(&raw)?, hash })
    }
    // Queries carry this tag; nothing upstream serves it.
    SourceList::ApiRequest => {
      Err(Error::NotASource(SourceList::ApiRequest))
    }
  }
}

// ─── Refresher ───────────────────────────────────────────────────────────────

/// Orchestrates refreshes against one [`FileSource`] and publishes into
/// one [`Corpus`].
pub struct Refresher<S> {
  corpus: Arc<Corpus>,
  source: S,
  config: RefreshConfig,
  /// Serializes refresh runs. Triggers that queue up behind an in-flight
  /// run collapse into at most one more run (see `refresh_all`).
  gate:   tokio::sync::Mutex<()>,
}

impl<S> Refresher<S>
where
  S: FileSource + Clone + Send + Sync + 'static,
{
  pub fn new(corpus: Arc<Corpus>, source: S, config: RefreshConfig) -> Self {
    Refresher {
      corpus,
      source,
      config,
      gate: tokio::sync::Mutex::new(()),
    }
  }

  pub fn corpus(&self) -> &Arc<Corpus> {
    &self.corpus
  }

  /// Refresh every configured source and publish the merged snapshot.
  ///
  /// Concurrent callers coalesce: whoever holds the gate does the work,
  /// and a caller that waited through a refresh which began after its own
  /// request returns that refresh's result instead of starting another.
  /// Callers needing a deadline wrap this future in `tokio::time::timeout`;
  /// dropping it discards all partial work unpublished.
  pub async fn refresh_all(&self) -> RefreshStats {
    let requested_at = Utc::now();
    let _guard = self.gate.lock().await;

    // A refresh that started after our request already did our work.
    let current = self.corpus.snapshot();
    if let Some(started) = current.started_at()
      && started > requested_at
    {
      return RefreshStats {
        total: current.entities.len(),
        lists: current.lists.clone(),
        changed: false,
      };
    }
    drop(current);

    let started_at = Utc::now();
    let mut tasks: JoinSet<(
      SourceList,
      Result<SourceOutcome>,
      DateTime<Utc>,
    )> = JoinSet::new();

    for &list in &self.config.included {
      let source = self.source.clone();
      let timeout = self.config.source_timeout;
      tasks.spawn(async move {
        let outcome =
          match tokio::time::timeout(timeout, run_source(&source, list))
            .await
          {
            Ok(result) => result,
            Err(_) => Err(Error::SourceTimeout(list)),
          };
        (list, outcome, Utc::now())
      });
    }

    let mut outcomes: Vec<(SourceList, Result<SourceOutcome>, DateTime<Utc>)> =
      Vec::new();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(outcome) => outcomes.push(outcome),
        Err(err) => tracing::error!(%err, "source task panicked"),
      }
    }

    self.merge_and_publish(started_at, outcomes)
  }

  /// Build the new snapshot from per-source outcomes, falling back to the
  /// previous snapshot for failed sources, and publish it.
  fn merge_and_publish(
    &self,
    started_at: DateTime<Utc>,
    mut outcomes: Vec<(SourceList, Result<SourceOutcome>, DateTime<Utc>)>,
  ) -> RefreshStats {
    // Publication order is fixed regardless of completion order.
    outcomes.sort_by_key(|(list, _, _)| {
      SourceList::ALL.iter().position(|l| l == list)
    });

    let previous = self.corpus.snapshot();
    let mut entities: Vec<Entity> = Vec::new();
    let mut lists: Vec<ListStats> = Vec::new();
    let mut changed = false;

    for (list, outcome, ended_at) in outcomes {
      match outcome {
        Ok(SourceOutcome { entities: parsed, hash }) => {
          let previous_hash =
            previous.stats(list).map(|s| s.hash.as_str());
          if previous_hash != Some(hash.as_str()) {
            changed = true;
          }
          tracing::info!(
            source = %list,
            count = parsed.len(),
            %hash,
            elapsed_ms = (ended_at - started_at).num_milliseconds(),
            "refreshed source"
          );
          lists.push(ListStats {
            source: list,
            count: parsed.len(),
            hash,
            started_at,
            ended_at,
          });
          entities.extend(parsed);
        }
        Err(err) => {
          let reused: Vec<Entity> = previous
            .entities
            .iter()
            .filter(|e| e.source == list)
            .cloned()
            .collect();
          match previous.stats(list) {
            Some(stats) => {
              tracing::warn!(
                source = %list,
                %err,
                reused = reused.len(),
                "source refresh failed; reusing previous snapshot"
              );
              lists.push(ListStats {
                source: list,
                count: reused.len(),
                hash: stats.hash.clone(),
                started_at,
                ended_at,
              });
            }
            None => {
              tracing::warn!(
                source = %list,
                %err,
                "source refresh failed with no previous data; \
                 serving degraded results for this list"
              );
              lists.push(ListStats {
                source: list,
                count: 0,
                hash: String::new(),
                started_at,
                ended_at,
              });
            }
          }
          entities.extend(reused);
        }
      }
    }

    let first_publish = previous.lists.is_empty();
    let snapshot = if changed || first_publish {
      Snapshot::new(entities, lists.clone(), self.config.version.clone())
    } else {
      // Nothing changed: keep the entity storage, update only timings.
      Snapshot {
        entities: previous.entities.clone(),
        lists:    lists.clone(),
        version:  self.config.version.clone(),
      }
    };
    let total = snapshot.entities.len();
    self.corpus.publish(snapshot);

    tracing::info!(total, changed, "published snapshot");
    RefreshStats { lists, total, changed }
  }

  /// Background loop: refresh on every interval tick until the task is
  /// aborted. The caller is expected to have run (or to run) an initial
  /// refresh; the first tick fires a full interval from now.
  pub async fn run_on_interval(self: Arc<Self>) {
    let mut ticker = tokio::time::interval(self.config.interval);
    ticker
      .set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // completes immediately
    loop {
      ticker.tick().await;
      self.refresh_all().await;
    }
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use watchman_core::{
    entity::EntityKind,
    search::{ScoreWeights, SearchOpts, search},
  };

  use super::*;
  use crate::download::DirSource;

  const SDN: &str = concat!(
    "7157,\"MADURO MOROS, Nicolas\",\"individual\",\"VENEZUELA\",",
    "\"President of the Bolivarian Republic of Venezuela\",-0- ,-0- ,-0- ,",
    "-0- ,-0- ,-0- ,\"DOB 23 Nov 1962; POB Caracas, Venezuela; Gender Male; ",
    "Cedula No. 5892464 (Venezuela).\"\n",
    "3748,\"COBALT REFINERY CO. INC.\",-0- ,\"CUBA\",-0- ,-0- ,-0- ,-0- ,",
    "-0- ,-0- ,-0- ,-0- \n",
  );

  const US_CSL: &str = concat!(
    "_id,source,type,programs,name,title,addresses,call_sign,vessel_type,",
    "gross_tonnage,gross_registered_tonnage,vessel_flag,vessel_owner,",
    "remarks,alt_names,dates_of_birth,places_of_birth,ids\n",
    "5001,Entity List (EL),Entity,EL,\"SHALLOW HARBOR TRADING\",",
    ",,,,,,,,,,,,\n",
  );

  fn write_fixtures(dir: &Path) {
    std::fs::write(dir.join(ofac::SDN_FILE), SDN).unwrap();
    std::fs::write(dir.join(ofac::ALT_FILE), "").unwrap();
    std::fs::write(dir.join(ofac::ADD_FILE), "").unwrap();
    std::fs::write(dir.join(csl_us::FILE), US_CSL).unwrap();
  }

  fn refresher(dir: &Path, included: Vec<SourceList>) -> Refresher<DirSource> {
    let config = RefreshConfig {
      included,
      ..RefreshConfig::default()
    };
    Refresher::new(
      Arc::new(Corpus::new()),
      DirSource::new(dir),
      config,
    )
  }

  #[tokio::test]
  async fn first_refresh_publishes_all_sources() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let r = refresher(
      dir.path(),
      vec![SourceList::UsOfac, SourceList::UsCsl],
    );
    let stats = r.refresh_all().await;

    assert!(stats.changed);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.lists.len(), 2);
    assert!(stats.lists.iter().all(|l| !l.hash.is_empty()));

    let snap = r.corpus().snapshot();
    assert_eq!(snap.entities.len(), 3);
    assert_eq!(snap.stats(SourceList::UsOfac).unwrap().count, 2);
    assert_eq!(snap.stats(SourceList::UsCsl).unwrap().count, 1);
  }

  #[tokio::test]
  async fn unchanged_content_republishes_without_copying() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let r = refresher(dir.path(), vec![SourceList::UsOfac]);
    r.refresh_all().await;
    let first = r.corpus().snapshot();

    let stats = r.refresh_all().await;
    assert!(!stats.changed);

    let second = r.corpus().snapshot();
    // Entity storage is shared, only the metadata was rebuilt.
    assert!(Arc::ptr_eq(&first.entities, &second.entities));
    assert!(
      second.stats(SourceList::UsOfac).unwrap().ended_at
        >= first.stats(SourceList::UsOfac).unwrap().ended_at
    );
  }

  #[tokio::test]
  async fn changed_content_publishes_a_new_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let r = refresher(dir.path(), vec![SourceList::UsOfac]);
    r.refresh_all().await;

    let extra = concat!(
      "13227,\"RODRIGUEZ GOMEZ, Delcy Eloina\",\"individual\",",
      "\"VENEZUELA\",-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- \n"
    );
    std::fs::write(
      dir.path().join(ofac::SDN_FILE),
      format!("{SDN}{extra}"),
    )
    .unwrap();

    let stats = r.refresh_all().await;
    assert!(stats.changed);
    assert_eq!(r.corpus().snapshot().entities.len(), 3);
  }

  #[tokio::test]
  async fn failed_source_reuses_the_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let r = refresher(
      dir.path(),
      vec![SourceList::UsOfac, SourceList::UsCsl],
    );
    r.refresh_all().await;

    // The next OFAC fetch fails; its entities must carry over.
    std::fs::remove_file(dir.path().join(ofac::SDN_FILE)).unwrap();
    let stats = r.refresh_all().await;

    let snap = r.corpus().snapshot();
    assert_eq!(snap.entities.len(), 3);
    assert_eq!(snap.stats(SourceList::UsOfac).unwrap().count, 2);
    assert!(!stats.changed);
  }

  #[tokio::test]
  async fn failed_source_on_first_refresh_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(csl_us::FILE), US_CSL).unwrap();

    let r = refresher(
      dir.path(),
      vec![SourceList::UsOfac, SourceList::UsCsl],
    );
    let stats = r.refresh_all().await;

    assert_eq!(stats.total, 1);
    let snap = r.corpus().snapshot();
    assert_eq!(snap.stats(SourceList::UsOfac).unwrap().count, 0);
    assert!(snap.stats(SourceList::UsOfac).unwrap().hash.is_empty());
  }

  #[tokio::test]
  async fn api_request_source_degrades_instead_of_panicking() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let r = refresher(
      dir.path(),
      vec![SourceList::UsOfac, SourceList::ApiRequest],
    );
    let stats = r.refresh_all().await;

    assert_eq!(stats.total, 2);
    let snap = r.corpus().snapshot();
    assert_eq!(snap.stats(SourceList::ApiRequest).unwrap().count, 0);
    assert!(snap.stats(SourceList::ApiRequest).unwrap().hash.is_empty());
  }

  #[tokio::test]
  async fn refreshed_corpus_answers_the_maduro_query() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let r = refresher(dir.path(), vec![SourceList::UsOfac]);
    r.refresh_all().await;

    let mut query =
      Entity::new(EntityKind::Person, SourceList::ApiRequest);
    query.name = "Nicolas Maduro".to_string();
    query.person.as_mut().unwrap().name = query.name.clone();
    let query = query.normalize();

    let snap = r.corpus().snapshot();
    let resp = search(
      &snap,
      &query,
      &SearchOpts::default(),
      &ScoreWeights::default(),
    )
    .unwrap();

    assert_eq!(resp.entities[0].entity.source_id, "7157");
    assert!(resp.entities[0].match_score >= 0.90);
  }

  #[tokio::test]
  async fn searches_during_a_refresh_see_one_consistent_era() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let r = Arc::new(refresher(dir.path(), vec![SourceList::UsOfac]));
    r.refresh_all().await;

    // Replace half the corpus while searches hammer the snapshot.
    let replacement = concat!(
      "13227,\"RODRIGUEZ GOMEZ, Delcy Eloina\",\"individual\",",
      "\"VENEZUELA\",-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- \n",
      "3748,\"COBALT REFINERY CO. INC.\",-0- ,\"CUBA\",-0- ,-0- ,-0- ,",
      "-0- ,-0- ,-0- ,-0- ,-0- \n",
    );
    std::fs::write(dir.path().join(ofac::SDN_FILE), replacement).unwrap();

    let searcher = {
      let r = r.clone();
      tokio::spawn(async move {
        for _ in 0..100 {
          let snap = r.corpus().snapshot();
          let ids: Vec<&String> =
            snap.entities.iter().map(|e| &e.source_id).collect();
          // Old era has 7157, new era has 13227; never both or neither.
          let old = ids.contains(&&"7157".to_string());
          let new = ids.contains(&&"13227".to_string());
          assert!(old ^ new, "mixed-era snapshot: {ids:?}");
          tokio::task::yield_now().await;
        }
      })
    };

    r.refresh_all().await;
    searcher.await.unwrap();
  }
}
