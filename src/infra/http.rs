use super::fs::Limits;
use super::FetchError;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::io::Read;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Client HTTP bloquant pour le serveur de clés et les URL directes.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    key_server: Url,
    limits: Limits,
}

impl HttpClient {
    pub fn new(key_server: &str, timeout: Duration, limits: Limits) -> Result<Self, FetchError> {
        let key_server = Url::parse(key_server)?;
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("keywatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            key_server,
            limits,
        })
    }

    /// URL de recherche HKP : la query du serveur configuré est remplacée.
    pub fn lookup_url(&self, key_id: &str) -> Url {
        let mut url = self.key_server.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("op", "get")
            .append_pair("search", key_id);
        url
    }

    pub fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let url = Url::parse(url)?;
        debug!(%url, "téléchargement de la clé");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(FetchError::Transport)?;

        if resp.status() != StatusCode::OK {
            return Err(FetchError::Status(resp.status().as_u16()));
        }

        let mut body = Vec::new();
        resp.take(self.limits.max_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(FetchError::Body)?;
        if body.len() as u64 > self.limits.max_bytes {
            return Err(FetchError::TooLarge {
                limit: self.limits.max_bytes,
            });
        }
        Ok(body)
    }
}
