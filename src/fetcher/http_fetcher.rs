use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::{Client, StatusCode, Url};

use crate::app::{Result, TwetError};
use crate::fetcher::{FetchResult, Fetcher};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Who we are, for feeds that like to know their followers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub nick: String,
    pub twturl: String,
}

impl Identity {
    pub fn user_agent(&self) -> String {
        format!(
            "twet/{} (+{}; @{})",
            env!("CARGO_PKG_VERSION"),
            self.twturl,
            self.nick
        )
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// The `User-Agent` header is only set when an identity is given.
    pub fn new(identity: Option<Identity>) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .brotli(true);

        if let Some(identity) = identity {
            tracing::debug!("disclosing identity as @{}", identity.nick);
            builder = builder.user_agent(identity.user_agent());
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, address: &str, freshness: &str) -> Result<FetchResult> {
        let requested = Url::parse(address)?;
        let mut headers = HeaderMap::new();

        if !freshness.is_empty() {
            if let Ok(value) = HeaderValue::from_str(freshness) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        let response = self
            .client
            .get(requested.clone())
            .headers(headers)
            .send()
            .await?;

        let canonical_address = if *response.url() != requested {
            tracing::debug!("{} moved to {}", address, response.url());
            Some(response.url().to_string())
        } else {
            None
        };

        if response.status() == StatusCode::NOT_MODIFIED {
            tracing::debug!("{} not modified", address);
            return Ok(FetchResult::Unchanged { canonical_address });
        }

        if !response.status().is_success() {
            return Err(TwetError::Status {
                address: address.to_string(),
                status: response.status().as_u16(),
            });
        }

        let freshness = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_default();

        let body = response.text().await?;

        Ok(FetchResult::Fresh {
            body,
            freshness,
            canonical_address,
        })
    }
}
