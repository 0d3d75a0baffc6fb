pub mod commands;

use std::path::PathBuf;

use chrono::TimeDelta;
use clap::{Parser, Subcommand};

use crate::config::TimelineMode;
use crate::fetcher::parallel::DEFAULT_WORKERS;

#[derive(Parser)]
#[command(name = "twet")]
#[command(version, about = "A twtxt client", long_about = None)]
pub struct Cli {
    /// Number of feeds fetched at the same time
    #[arg(short, long, default_value_t = DEFAULT_WORKERS, global = true)]
    pub workers: usize,

    /// Directory holding config.toml and the cache
    #[arg(short, long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Log diagnostics to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch followed feeds and show the timeline
    Timeline {
        /// Only show records at most this old (e.g. "12h", "1h30m", "2d")
        #[arg(short, long, value_parser = parse_duration)]
        duration: Option<TimeDelta>,

        /// Only show the feed followed under this nick
        #[arg(short, long)]
        source: Option<String>,

        /// Don't fetch, show what is cached
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Print tab separated records without styling
        #[arg(short, long)]
        raw: bool,

        /// Newest records first
        #[arg(long)]
        reverse: bool,

        /// Override the configured timeline mode
        #[arg(long, value_enum)]
        mode: Option<TimelineMode>,
    },
    /// Append a new entry to your own feed
    #[command(alias = "twet")]
    Tweet {
        /// Words of the entry; read from stdin when empty
        words: Vec<String>,
    },
    /// List followed feeds
    Following {
        /// Print tab separated pairs
        #[arg(short, long)]
        raw: bool,
    },
}

/// Parse a duration like "90s", "30m", "12h", "2d" or "1h30m".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<TimeDelta, String> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err("Empty duration".to_string());
    }
    if s.starts_with('-') {
        return Err("Negative duration doesn't make sense".to_string());
    }

    if let Ok(secs) = s.parse::<i64>() {
        return to_delta(secs, &s);
    }

    let mut total = 0i64;
    let mut digits = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit = match c {
            'd' => 86400,
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => {
                return Err(format!(
                    "Invalid duration: {}. Use format like '1h', '30m', '1d'",
                    s
                ))
            }
        };

        let amount = digits
            .parse::<i64>()
            .map_err(|_| format!("Invalid duration: {}", s))?;
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("Duration too long: {}", s))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(format!("Missing unit after {} in {}", digits, s));
    }

    to_delta(total, &s)
}

fn to_delta(secs: i64, s: &str) -> Result<TimeDelta, String> {
    TimeDelta::try_seconds(secs).ok_or_else(|| format!("Duration too long: {}", s))
}
