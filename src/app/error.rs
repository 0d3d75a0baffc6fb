use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum TwetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache encoding error: {0}")]
    CacheCodec(#[from] bincode::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    #[error("Unsupported address scheme: {0}")]
    UnsupportedScheme(String),

    #[error("{address} answered with status {status}")]
    Status { address: String, status: u16 },

    #[error("Gemini error: {0}")]
    Gemini(String),

    #[error("Timed out fetching {0}")]
    Timeout(String),

    #[error("No source with nick {0:?}")]
    SourceNotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TwetError>;
