use std::collections::BTreeMap;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat, TimeDelta, TimeZone, Utc};
use tokio::io::AsyncWriteExt;

use crate::app::{AppContext, Result, TwetError};
use crate::config::TimelineMode;
use crate::fetcher::parallel::{FetchProgress, FetchReport};
use crate::output::{expand_mentions, format_record, format_record_raw};
use crate::store::Cache;
use crate::timeline::{assemble, Order, TimelineFilter};

#[derive(Debug, Clone, Default)]
pub struct TimelineOptions {
    pub duration: Option<TimeDelta>,
    pub source: Option<String>,
    pub dry_run: bool,
    pub raw: bool,
    pub reverse: bool,
    pub mode: Option<TimelineMode>,
}

pub async fn timeline(ctx: &mut AppContext, opts: &TimelineOptions) -> Result<()> {
    let mut cache = Cache::load(&ctx.cache_path)?;
    let previous_run = Cache::last_stored(&ctx.cache_path)?;
    let mut sources = ctx.config.select_sources(opts.source.as_deref())?;

    if opts.dry_run {
        tracing::debug!("dry run, showing cached records only");
    } else {
        let report = fetch_round(ctx, &sources, &mut cache).await;
        cache.store(&ctx.cache_path)?;

        if !report.relocated.is_empty() {
            report.apply_relocations(&mut ctx.config)?;
            sources = ctx.config.select_sources(opts.source.as_deref())?;
        }
    }

    let filter = match (opts.duration, opts.mode.unwrap_or(ctx.config.timeline)) {
        (Some(window), _) => TimelineFilter::Within(window),
        (None, TimelineMode::New) => TimelineFilter::Since(previous_run),
        (None, TimelineMode::Full) => TimelineFilter::All,
    };
    let order = if opts.reverse {
        Order::NewestFirst
    } else {
        Order::OldestFirst
    };

    let now = Utc::now();
    for record in assemble(&cache, &sources, filter, order, now) {
        if opts.raw {
            println!("{}", format_record_raw(&record));
        } else {
            println!("{}", format_record(&record, now, &ctx.config));
            println!();
        }
    }

    Ok(())
}

async fn fetch_round(
    ctx: &AppContext,
    sources: &BTreeMap<String, String>,
    cache: &mut Cache,
) -> FetchReport {
    let interactive = io::stderr().is_terminal();

    let report = ctx
        .parallel_fetcher
        .fetch_all_with_progress(sources, cache, |progress: &FetchProgress| {
            if interactive {
                eprint!("\rUpdating feeds... {}/{}", progress.done, progress.total);
            }
        })
        .await;

    if interactive && !sources.is_empty() {
        eprintln!();
    }

    tracing::info!(
        "fetch round done: {} fresh, {} unchanged, {} failed",
        report.fresh,
        report.unchanged,
        report.failed
    );

    report
}

pub async fn tweet(ctx: &AppContext, words: &[String]) -> Result<()> {
    let twtfile = ctx.config.twtfile.trim();
    if twtfile.is_empty() {
        return Err(TwetError::Other(
            "cannot tweet without twtfile set in config".into(),
        ));
    }
    let path = expand_home(twtfile);

    let text = if words.is_empty() {
        read_line()?
    } else {
        words.join(" ")
    };
    let entry = compose_entry(&text, &ctx.config.following, Local::now())?;

    run_hook("pre", &ctx.config.hooks.pre).await?;
    let written = append_entry(&path, &entry).await?;
    println!("appended {} bytes to {}:\n{}", written, path.display(), entry);
    run_hook("post", &ctx.config.hooks.post).await?;

    Ok(())
}

pub fn following(ctx: &AppContext, raw: bool) -> Result<()> {
    if ctx.config.following.is_empty() {
        println!("Not following anyone");
        return Ok(());
    }

    for (nick, address) in &ctx.config.following {
        if raw {
            println!("{}\t{}", nick, address);
        } else {
            println!("{} @ {}", nick, address);
        }
    }

    Ok(())
}

/// Builds the feed line for a new entry: timestamp, tab, text, newline.
pub fn compose_entry<Tz>(
    text: &str,
    following: &BTreeMap<String, String>,
    now: DateTime<Tz>,
) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let text = text.trim();
    if text.is_empty() {
        return Err(TwetError::Other(
            "cowardly refusing to tweet empty text, or only spaces".into(),
        ));
    }

    Ok(format!(
        "{}\t{}\n",
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        expand_mentions(text, following)
    ))
}

/// Appends `entry` to the feed file, creating it if needed.
pub async fn append_entry(path: &Path, entry: &str) -> Result<usize> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(entry.as_bytes()).await?;
    file.flush().await?;
    Ok(entry.len())
}

async fn run_hook(stage: &str, command: &str) -> Result<()> {
    if command.trim().is_empty() {
        return Ok(());
    }

    tracing::debug!("running {} hook: {}", stage, command);
    let output = tokio::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .output()
        .await?;

    if !output.status.success() {
        return Err(TwetError::Other(format!(
            "{} hook failed ({}): {}",
            stage,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

fn read_line() -> Result<String> {
    print!("> ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
