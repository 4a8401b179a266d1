//! Récupération des certificats.

pub mod fs;
pub mod http;

use fs::{read_file_bounded, Limits};
use http::HttpClient;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("parse url: {0}")]
    LookupUrl(#[from] url::ParseError),
    #[error("build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("execute http request: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("http status {0}")]
    Status(u16),
    #[error("read response body: {0}")]
    Body(#[source] std::io::Error),
    #[error("certificate larger than {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("read {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
}

/// Provenance d’une clé configurée.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeySource {
    /// Key ID `0x...` résolu via le serveur de clés.
    Keyserver(String),
    /// Adresse `http://` ou `https://`.
    Url(String),
    /// `file:<chemin>`
    File(String),
}

impl KeySource {
    pub fn parse(key: &str) -> Option<Self> {
        if key.starts_with("0x") {
            Some(Self::Keyserver(key.to_string()))
        } else if key.starts_with("http://") || key.starts_with("https://") {
            Some(Self::Url(key.to_string()))
        } else {
            key.strip_prefix("file:")
                .map(|path| Self::File(path.to_string()))
        }
    }
}

/// Récupère les octets bruts d’un certificat.
pub trait Retrieve {
    fn fetch(&self, source: &KeySource) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug)]
pub struct Fetcher {
    http: HttpClient,
    limits: Limits,
}

impl Fetcher {
    pub fn new(http: HttpClient, limits: Limits) -> Self {
        Self { http, limits }
    }
}

impl Retrieve for Fetcher {
    fn fetch(&self, source: &KeySource) -> Result<Vec<u8>, FetchError> {
        match source {
            KeySource::Keyserver(id) => self.http.get(self.http.lookup_url(id).as_str()),
            KeySource::Url(url) => self.http.get(url),
            KeySource::File(path) => read_file_bounded(path, &self.limits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sources() {
        assert_eq!(
            KeySource::parse("0x0123456789ABCDEF"),
            Some(KeySource::Keyserver("0x0123456789ABCDEF".into()))
        );
        assert_eq!(
            KeySource::parse("https://example.org/key.asc"),
            Some(KeySource::Url("https://example.org/key.asc".into()))
        );
        assert_eq!(
            KeySource::parse("file:/etc/keys/a.asc"),
            Some(KeySource::File("/etc/keys/a.asc".into()))
        );
        assert_eq!(KeySource::parse("ABCDEF"), None);
        assert_eq!(KeySource::parse("httpx"), None);
    }
}
