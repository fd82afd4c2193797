//! Watchlist sources for the watchman screener.
//!
//! Each adapter module fetches and parses one upstream list into
//! [`watchman_core::entity::Entity`] records; [`refresh`] orchestrates
//! them concurrently and publishes the merged snapshot into a
//! [`watchman_core::corpus::Corpus`].

// Native `async fn` in traits; `Send` bounds are spelled where needed.
#![allow(async_fn_in_trait)]

pub mod csl_eu;
pub mod csl_uk;
pub mod csl_us;
mod csvutil;
pub mod download;
pub mod error;
pub mod ingest;
pub mod ofac;
mod remarks;
pub mod refresh;

pub use error::{Error, Result};
