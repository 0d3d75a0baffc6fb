pub mod file;
pub mod gemini;
pub mod http_fetcher;
pub mod parallel;

use async_trait::async_trait;

use crate::app::{Result, TwetError};
use crate::domain::source::scheme_of;

use file::FileFetcher;
use gemini::GeminiFetcher;
use http_fetcher::{HttpFetcher, Identity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Content unchanged since the freshness token we sent
    Unchanged {
        /// Set when the feed answered from a different address (redirect)
        canonical_address: Option<String>,
    },
    /// New content fetched successfully
    Fresh {
        body: String,
        /// Token to send next time; empty when the transport gave none
        freshness: String,
        /// Set when the feed answered from a different address (redirect)
        canonical_address: Option<String>,
    },
}

/// One way of retrieving a feed body.
///
/// A transport failure is reported as `Err`; callers must keep whatever they
/// had cached for the address.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, address: &str, freshness: &str) -> Result<FetchResult>;
}

/// Routes each address to the transport its scheme asks for.
pub struct SchemeFetcher {
    file: FileFetcher,
    http: HttpFetcher,
    gemini: GeminiFetcher,
}

impl SchemeFetcher {
    pub fn new(identity: Option<Identity>) -> Result<Self> {
        Ok(Self {
            file: FileFetcher::new(),
            http: HttpFetcher::new(identity)?,
            gemini: GeminiFetcher::new()?,
        })
    }
}

#[async_trait]
impl Fetcher for SchemeFetcher {
    async fn fetch(&self, address: &str, freshness: &str) -> Result<FetchResult> {
        match scheme_of(address).as_deref() {
            Some("file") => self.file.fetch(address, freshness).await,
            Some("http") | Some("https") => self.http.fetch(address, freshness).await,
            Some("gemini") => self.gemini.fetch(address, freshness).await,
            _ => Err(TwetError::UnsupportedScheme(address.to_string())),
        }
    }
}
