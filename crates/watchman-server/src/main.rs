//! watchman server binary.
//!
//! Reads `config.toml` (or the path given with `--config`, with
//! `WATCHMAN_`-prefixed environment overrides), performs an initial
//! refresh of every configured list, keeps refreshing on an interval in
//! the background, and serves the JSON API.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use watchman_api::AppState;
use watchman_core::{
  corpus::Corpus,
  entity::SourceList,
  search::ScoreWeights,
};
use watchman_sources::{
  download::{DirSource, FileSource, HttpSource},
  refresh::{RefreshConfig, Refresher},
};

#[derive(Parser)]
#[command(author, version, about = "Watchman sanctions-screening server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// Runtime configuration, deserialised from `config.toml` and the
/// `WATCHMAN_*` environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ServerConfig {
  host:                 String,
  port:                 u16,
  /// Hours between scheduled refreshes.
  refresh_interval_hrs: u64,
  /// Per-source download budget, in seconds.
  source_timeout_secs:  u64,
  /// Per-request search budget, in seconds.
  search_timeout_secs:  u64,
  /// Load list files from this directory instead of the network.
  initial_data_dir:     Option<PathBuf>,
  /// Restrict refreshes to these lists (source names); empty means all.
  included_lists:       Vec<String>,
  /// Per-field scoring weights (see `[weights]` in config.toml);
  /// unset fields keep their defaults.
  weights:              ScoreWeights,
}

impl Default for ServerConfig {
  fn default() -> Self {
    ServerConfig {
      host:                 "0.0.0.0".to_string(),
      port:                 8084,
      refresh_interval_hrs: 24,
      source_timeout_secs:  30,
      search_timeout_secs:  5,
      initial_data_dir:     None,
      included_lists:       Vec::new(),
      weights:              ScoreWeights::default(),
    }
  }
}

/// The configured byte source: upstream HTTP by default, a local
/// directory when `initial_data_dir` is set.
#[derive(Clone)]
enum ByteSource {
  Http(HttpSource),
  Dir(DirSource),
}

impl FileSource for ByteSource {
  async fn fetch(
    &self,
    name: &str,
    url: &str,
  ) -> watchman_sources::Result<Vec<u8>> {
    match self {
      ByteSource::Http(s) => s.fetch(name, url).await,
      ByteSource::Dir(s) => s.fetch(name, url).await,
    }
  }
}

fn refresh_config(cfg: &ServerConfig) -> anyhow::Result<RefreshConfig> {
  let mut refresh = RefreshConfig {
    interval: Duration::from_secs(cfg.refresh_interval_hrs * 60 * 60),
    source_timeout: Duration::from_secs(cfg.source_timeout_secs),
    ..RefreshConfig::default()
  };
  if !cfg.included_lists.is_empty() {
    let included: Vec<SourceList> = cfg
      .included_lists
      .iter()
      .map(|name| name.parse())
      .collect::<Result<_, _>>()
      .context("invalid included_lists entry")?;
    if let Some(bad) =
      included.iter().copied().find(|l| !SourceList::ALL.contains(l))
    {
      anyhow::bail!(
        "included_lists entry {bad} is not a refreshable source"
      );
    }
    refresh.included = included;
  }
  Ok(refresh)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WATCHMAN"))
    .build()
    .context("failed to read config file")?;
  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let source = match &server_cfg.initial_data_dir {
    Some(dir) => {
      tracing::info!(dir = %dir.display(), "loading lists from directory");
      ByteSource::Dir(DirSource::new(dir))
    }
    None => ByteSource::Http(
      HttpSource::new(Duration::from_secs(
        server_cfg.source_timeout_secs,
      ))
      .context("failed to build HTTP client")?,
    ),
  };

  let corpus = Arc::new(Corpus::new());
  let refresher = Arc::new(Refresher::new(
    corpus.clone(),
    source,
    refresh_config(&server_cfg)?,
  ));

  // First refresh before accepting traffic; a degraded start (some or all
  // sources failing) still serves queries against what loaded.
  let stats = refresher.refresh_all().await;
  tracing::info!(total = stats.total, "initial refresh complete");

  tokio::spawn(refresher.clone().run_on_interval());

  let state = AppState {
    corpus,
    weights: Arc::new(server_cfg.weights.clone()),
    search_timeout: Duration::from_secs(server_cfg.search_timeout_secs),
  };
  let app = watchman_api::api_router(state);

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config_from(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn weights_come_from_config() {
    let cfg = config_from("[weights]\nname = 0.7\n");
    assert!((cfg.weights.name - 0.7).abs() < 1e-9);
    // Fields left unset keep their defaults.
    assert!((cfg.weights.alt_names - 0.15).abs() < 1e-9);
  }

  #[test]
  fn api_request_is_rejected_from_included_lists() {
    let cfg = ServerConfig {
      included_lists: vec!["api_request".to_string()],
      ..ServerConfig::default()
    };
    assert!(refresh_config(&cfg).is_err());
  }

  #[test]
  fn unknown_list_names_are_rejected() {
    let cfg = ServerConfig {
      included_lists: vec!["us_ofak".to_string()],
      ..ServerConfig::default()
    };
    assert!(refresh_config(&cfg).is_err());
  }

  #[test]
  fn valid_list_names_are_accepted() {
    let cfg = ServerConfig {
      included_lists: vec!["us_ofac".to_string(), "eu_csl".to_string()],
      ..ServerConfig::default()
    };
    let refresh = refresh_config(&cfg).unwrap();
    assert_eq!(
      refresh.included,
      vec![SourceList::UsOfac, SourceList::EuCsl]
    );
  }
}
