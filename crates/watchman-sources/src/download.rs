//! Byte-source abstraction for list files.
//!
//! Adapters fetch raw bytes through [`FileSource`] so the refresh
//! pipeline can run against the real upstream endpoints ([`HttpSource`])
//! or a local directory of previously downloaded files ([`DirSource`],
//! used by tests and offline starts).

use std::{future::Future, path::PathBuf, time::Duration};

use rand::Rng;

use crate::error::{Error, Result};

/// Fetches one named file as raw bytes. `name` is the canonical file name
/// (e.g. `sdn.csv`); `url` is the upstream location, which [`DirSource`]
/// ignores.
///
/// The returned futures are `Send` so sources can run under a
/// multi-threaded runtime (tokio `JoinSet` in the refresh coordinator).
pub trait FileSource: Send + Sync {
  fn fetch<'a>(
    &'a self,
    name: &'a str,
    url: &'a str,
  ) -> impl Future<Output = Result<Vec<u8>>> + Send + 'a;
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

/// Per-attempt retry schedule: exponential backoff with jitter.
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(10);

/// Downloads list files over HTTPS with retries.
#[derive(Clone)]
pub struct HttpSource {
  client: reqwest::Client,
}

impl HttpSource {
  /// `timeout` bounds each individual request attempt.
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|source| Error::Fetch {
        name: "client".to_string(),
        source,
      })?;
    Ok(HttpSource { client })
  }

  async fn attempt(&self, name: &str, url: &str) -> Result<Vec<u8>> {
    let resp =
      self.client.get(url).send().await.map_err(|source| Error::Fetch {
        name: name.to_string(),
        source,
      })?;
    if !resp.status().is_success() {
      return Err(Error::FetchStatus {
        name:   name.to_string(),
        status: resp.status().as_u16(),
      });
    }
    let body = resp.bytes().await.map_err(|source| Error::Fetch {
      name: name.to_string(),
      source,
    })?;
    Ok(body.to_vec())
  }
}

fn backoff(attempt: u32) -> Duration {
  let exp = RETRY_BASE.saturating_mul(1 << attempt).min(RETRY_MAX);
  let jitter = rand::rng().random_range(0..500);
  exp + Duration::from_millis(jitter)
}

impl FileSource for HttpSource {
  async fn fetch(&self, name: &str, url: &str) -> Result<Vec<u8>> {
    let mut last_err = None;
    for attempt in 0..RETRY_ATTEMPTS {
      if attempt > 0 {
        tokio::time::sleep(backoff(attempt - 1)).await;
      }
      match self.attempt(name, url).await {
        Ok(bytes) => return Ok(bytes),
        Err(err) => {
          tracing::warn!(name, attempt, %err, "download attempt failed");
          last_err = Some(err);
        }
      }
    }
    Err(last_err.expect("at least one attempt ran"))
  }
}

// ─── Local directory ─────────────────────────────────────────────────────────

/// Serves list files from a directory, keyed by canonical file name.
#[derive(Debug, Clone)]
pub struct DirSource {
  dir: PathBuf,
}

impl DirSource {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    DirSource { dir: dir.into() }
  }
}

impl FileSource for DirSource {
  async fn fetch(&self, name: &str, _url: &str) -> Result<Vec<u8>> {
    let path = self.dir.join(name);
    tokio::fs::read(&path).await.map_err(|source| Error::Io {
      name: name.to_string(),
      source,
    })
  }
}
