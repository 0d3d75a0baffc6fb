use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;

use crate::app::{Result, TwetError};
use crate::fetcher::{FetchResult, Fetcher};

/// Reads `file://` feeds straight from disk.
///
/// The freshness token is the file's modification time, so an untouched file
/// is reported as unchanged without being read.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }
}

fn path_of(address: &str) -> Result<PathBuf> {
    Url::parse(address)?
        .to_file_path()
        .map_err(|_| TwetError::Other(format!("not a local file address: {}", address)))
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, address: &str, freshness: &str) -> Result<FetchResult> {
        let path = path_of(address)?;
        let meta = tokio::fs::metadata(&path).await?;
        let modified = DateTime::<Utc>::from(meta.modified()?)
            .to_rfc3339_opts(SecondsFormat::Nanos, true);

        if !freshness.is_empty() && freshness == modified {
            tracing::debug!("{} not modified", address);
            return Ok(FetchResult::Unchanged {
                canonical_address: None,
            });
        }

        let bytes = tokio::fs::read(&path).await?;

        Ok(FetchResult::Fresh {
            body: String::from_utf8_lossy(&bytes).into_owned(),
            freshness: modified,
            canonical_address: None,
        })
    }
}
