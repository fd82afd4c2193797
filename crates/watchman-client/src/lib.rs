//! Async HTTP client wrapping the watchman JSON API.
//!
//! The base URL comes from the `WATCHMAN_ADDRESS` environment variable or
//! [`ApiConfig`]; query entities are encoded with the same
//! [`watchman_core::params`] tables the server decodes with.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use watchman_core::{
  entity::Entity,
  params::{self, IngestFileResponse, ListInfoResponse},
  search::{SearchOpts, SearchResponse},
};

/// Connection settings for the watchman API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout:  Duration,
}

impl Default for ApiConfig {
  fn default() -> Self {
    ApiConfig {
      base_url: std::env::var("WATCHMAN_ADDRESS")
        .unwrap_or_else(|_| "http://localhost:8084".to_string()),
      timeout:  Duration::from_secs(30),
    }
  }
}

/// Error envelope the server uses for 4xx/5xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  error: String,
}

/// Async HTTP client for the watchman JSON API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .context("failed to build HTTP client")?;
    Ok(ApiClient { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{path}", self.config.base_url.trim_end_matches('/'))
  }

  async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
      return Ok(resp);
    }
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
      Ok(body) => Err(anyhow!("{status}: {}", body.error)),
      Err(_) => Err(anyhow!("unexpected status {status}")),
    }
  }

  /// `GET /v2/listinfo`
  pub async fn list_info(&self) -> Result<ListInfoResponse> {
    let resp = self
      .client
      .get(self.url("/v2/listinfo"))
      .send()
      .await
      .context("GET /v2/listinfo failed")?;
    Self::check(resp)
      .await?
      .json()
      .await
      .context("deserialising listinfo response")
  }

  /// `GET /v2/search`. Populated fields of `entity` are compared against
  /// the corpus.
  pub async fn search_by_entity(
    &self,
    entity: &Entity,
    opts: &SearchOpts,
  ) -> Result<SearchResponse> {
    let mut pairs = params::encode_entity(entity);
    params::encode_opts(&mut pairs, opts);

    let resp = self
      .client
      .get(self.url("/v2/search"))
      .query(&pairs)
      .send()
      .await
      .context("GET /v2/search failed")?;
    Self::check(resp)
      .await?
      .json()
      .await
      .context("deserialising search response")
  }

  /// `POST /v2/ingest/{fileType}`. Upload a CSV body and get the parsed
  /// entities back as a preview.
  pub async fn ingest_file(
    &self,
    file_type: &str,
    body: impl Into<String>,
  ) -> Result<IngestFileResponse> {
    let resp = self
      .client
      .post(self.url(&format!("/v2/ingest/{file_type}")))
      .body(body.into())
      .send()
      .await
      .with_context(|| format!("POST /v2/ingest/{file_type} failed"))?;
    Self::check(resp)
      .await?
      .json()
      .await
      .context("deserialising ingest response")
  }
}
