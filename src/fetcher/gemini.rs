//! Minimal Gemini client.
//!
//! Gemini capsules overwhelmingly use self-signed certificates, so the TLS
//! layer accepts any server certificate while still checking handshake
//! signatures. The protocol has no conditional requests: every fetch is
//! fresh and carries an empty freshness token.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{self, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::TlsConnector;
use url::Url;

use crate::app::{Result, TwetError};
use crate::fetcher::http_fetcher::REQUEST_TIMEOUT;
use crate::fetcher::{FetchResult, Fetcher};

pub const DEFAULT_PORT: u16 = 1965;

/// `<STATUS><SPACE><META>\r\n` may not exceed this many bytes.
const MAX_HEADER_LEN: usize = 1029;

pub struct GeminiFetcher {
    connector: TlsConnector,
}

impl GeminiFetcher {
    pub fn new() -> Result<Self> {
        let provider = Arc::new(crypto::aws_lc_rs::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    async fn request(&self, url: &Url) -> Result<Vec<u8>> {
        let host = url
            .host_str()
            .ok_or_else(|| TwetError::Gemini(format!("no host in {}", url)))?;
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| TwetError::Gemini(format!("bad server name {}: {}", host, e)))?;

        let tcp = TcpStream::connect((host, port)).await?;
        let mut stream = self.connector.connect(server_name, tcp).await?;

        stream
            .write_all(format!("{}\r\n", url.as_str()).as_bytes())
            .await?;
        stream.flush().await?;

        let mut response = Vec::new();
        match stream.read_to_end(&mut response).await {
            Ok(_) => {}
            // plenty of servers hang up without close_notify
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
            Err(e) => return Err(e.into()),
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for GeminiFetcher {
    async fn fetch(&self, address: &str, _freshness: &str) -> Result<FetchResult> {
        let url = Url::parse(address)?;

        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.request(&url))
            .await
            .map_err(|_| TwetError::Timeout(address.to_string()))??;

        let (status, meta, body) = split_response(&response)?;
        if !(20..30).contains(&status) {
            return Err(TwetError::Gemini(format!(
                "{} answered with status {} {}",
                address, status, meta
            )));
        }

        Ok(FetchResult::Fresh {
            body: String::from_utf8_lossy(body).into_owned(),
            freshness: String::new(),
            canonical_address: None,
        })
    }
}

/// Splits a raw response into status, meta and body.
fn split_response(response: &[u8]) -> Result<(u8, String, &[u8])> {
    let end = response
        .windows(2)
        .take(MAX_HEADER_LEN)
        .position(|w| w == b"\r\n")
        .ok_or_else(|| TwetError::Gemini("missing response header".into()))?;

    let header = std::str::from_utf8(&response[..end])
        .map_err(|_| TwetError::Gemini("response header is not UTF-8".into()))?;
    let (status, meta) = parse_header(header)?;

    Ok((status, meta, &response[end + 2..]))
}

fn parse_header(header: &str) -> Result<(u8, String)> {
    let (code, meta) = header.split_once(' ').unwrap_or((header, ""));

    if code.len() != 2 {
        return Err(TwetError::Gemini(format!("malformed status {:?}", code)));
    }
    let status = code
        .parse::<u8>()
        .map_err(|_| TwetError::Gemini(format!("malformed status {:?}", code)))?;

    Ok((status, meta.trim().to_string()))
}

#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_header() {
        let (status, meta) = parse_header("20 text/plain; charset=utf-8").unwrap();
        assert_eq!(status, 20);
        assert_eq!(meta, "text/plain; charset=utf-8");
    }

    #[test]
    fn test_parse_header_without_meta() {
        assert_eq!(parse_header("51").unwrap(), (51, String::new()));
    }

    #[test]
    fn test_parse_malformed_header() {
        assert!(parse_header("200 OK").is_err());
        assert!(parse_header("xx nope").is_err());
        assert!(parse_header("").is_err());
    }

    #[test]
    fn test_split_response() {
        let raw = b"20 text/plain\r\n2021-01-01T00:00:00Z\thello\n";
        let (status, meta, body) = split_response(raw).unwrap();
        assert_eq!(status, 20);
        assert_eq!(meta, "text/plain");
        assert_eq!(body, b"2021-01-01T00:00:00Z\thello\n");
    }

    #[test]
    fn test_split_response_without_header_end() {
        assert!(split_response(b"20 text/plain").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_capsule_fails() {
        let fetcher = GeminiFetcher::new().unwrap();
        // nothing listens on port 1 locally
        let result = fetcher.fetch("gemini://127.0.0.1:1/twtxt.txt", "").await;
        assert!(result.is_err());
    }
}
