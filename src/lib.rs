//! # twet
//!
//! A client for twtxt, the decentralised microblog made of plain text files.
//!
//! ## Architecture
//!
//! Every run is one fetch round followed by a render:
//!
//! ```text
//! Config → ParallelFetcher → Fetcher (file / http / gemini) → Normalizer → Cache → Timeline
//! ```
//!
//! - [`fetcher`]: per-scheme transports with freshness tokens, fetched concurrently
//! - [`normalizer`]: parses `timestamp<TAB>text` lines into records
//! - [`store`]: the persisted cache of records per feed address
//! - [`timeline`]: merges cached feeds into one ordered, filtered list
//!
//! ## Quick Start
//!
//! ```bash
//! # Show the timeline of the last 12 hours
//! twet timeline -d 12h
//!
//! # Post something
//! twet tweet "hello @alice"
//!
//! # Who do I follow?
//! twet following
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the config,
/// the cache location and the parallel fetcher.
pub mod app;

/// Command-line interface using clap.
///
/// - `timeline` - Fetch followed feeds and print the timeline
/// - `tweet` - Append an entry to your own feed
/// - `following` - List followed feeds
pub mod cli;

/// Configuration and followed feeds.
///
/// Loads `config.toml` from `--config-dir` or the usual config directories.
pub mod config;

/// Core domain models.
///
/// - [`Source`](domain::Source): a followed feed, by nick and address
/// - [`Record`](domain::Record): one timestamped entry of a feed
pub mod domain;

/// Fetching feeds with freshness tokens.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for a single transport
/// - [`SchemeFetcher`](fetcher::SchemeFetcher): Routes addresses by URL scheme
/// - [`ParallelFetcher`](fetcher::parallel::ParallelFetcher): Concurrent fetch round with semaphore
pub mod fetcher;

/// Parsing feed bodies into records.
pub mod normalizer;

/// Rendering records, durations and mentions for the terminal.
pub mod output;

/// The persisted record cache.
pub mod store;

/// Timeline assembly.
pub mod timeline;
