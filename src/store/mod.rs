//! The persisted feed cache.
//!
//! One bincode blob on disk maps every address ever fetched to the records it
//! last produced and the freshness token that came with them. Entries are
//! never evicted.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::{Record, RecordSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub records: RecordSet,
    /// Opaque marker from the last successful fetch. Empty means stale.
    pub freshness: String,
}

impl CacheEntry {
    pub fn new(records: RecordSet, freshness: impl Into<String>) -> Self {
        Self {
            records,
            freshness: freshness.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the cache blob, or an empty cache when there is no file yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("no cache at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let cache: Cache = bincode::deserialize(&bytes)?;
        tracing::debug!("loaded {} cached feeds from {}", cache.len(), path.display());
        Ok(cache)
    }

    /// Overwrites the blob at `path` with the whole cache.
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = bincode::serialize(self)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = fs::File::create(path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// When the blob at `path` was last written, or the epoch if never.
    pub fn last_stored<P: AsRef<Path>>(path: P) -> Result<DateTime<Utc>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(DateTime::<Utc>::from(meta.modified()?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DateTime::<Utc>::UNIX_EPOCH),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, address: &str) -> Option<&CacheEntry> {
        self.entries.get(address)
    }

    pub fn put(&mut self, address: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(address.into(), entry);
    }

    /// Moves the entry cached under `from` to `to`, pointing its records at
    /// the new address.
    pub fn relocate(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(mut entry) = self.entries.remove(from) {
            for record in &mut entry.records {
                record.origin.address = to.to_string();
            }
            self.entries.insert(to.to_string(), entry);
        }
    }

    /// The freshness token for `address`, empty when nothing is cached.
    pub fn freshness(&self, address: &str) -> &str {
        self.get(address).map(|e| e.freshness.as_str()).unwrap_or("")
    }

    pub fn records(&self, address: &str) -> &[Record] {
        self.get(address).map(|e| e.records.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
