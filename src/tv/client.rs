//! HTTP client for the Philips JointSpace API.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::digest::{new_cnonce, DigestChallenge};
use super::types::{AmbilightConfiguration, AmbilightLayers};
use super::TvClient;
use crate::error::{AmbiError, Result};

/// Connection settings for one TV.
#[derive(Debug, Clone)]
pub struct TvConfig {
    /// Hostname or IP address of the TV.
    pub host: String,
    /// JointSpace API version. 6 and newer are served over HTTPS on 1926.
    pub api_version: u8,
    pub username: String,
    pub password: String,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl TvConfig {
    /// Create a config with defaults.
    ///
    /// - api_version: 6
    /// - connect_timeout: 3 s
    /// - request_timeout: 5 s
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_version: 6,
            username: String::new(),
            password: String::new(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// `https://{host}:1926/{v}` for API 6+, `http://{host}:1925/{v}` before.
    pub fn base_url(&self) -> String {
        if self.api_version >= 6 {
            format!("https://{}:1926/{}", self.host, self.api_version)
        } else {
            format!("http://{}:1925/{}", self.host, self.api_version)
        }
    }
}

struct AuthState {
    challenge: DigestChallenge,
    nc: u32,
}

/// A TV reachable over JointSpace.
///
/// Use [`PhilipsTvBuilder`] for construction.
pub struct PhilipsTv {
    config: TvConfig,
    client: reqwest::Client,
    auth: Mutex<Option<AuthState>>,
}

impl PhilipsTv {
    /// Start building a client aimed at `host`.
    pub fn builder(host: impl Into<String>) -> PhilipsTvBuilder {
        PhilipsTvBuilder::new(host)
    }

    pub fn config(&self) -> &TvConfig {
        &self.config
    }

    /// Next `Authorization` value from the cached challenge, if any.
    fn next_authorization(&self, uri: &str) -> Option<String> {
        let mut guard = self.auth.lock().ok()?;
        let state = guard.as_mut()?;
        state.nc = state.nc.wrapping_add(1);
        Some(state.challenge.authorization(
            &self.config.username,
            &self.config.password,
            "GET",
            uri,
            state.nc,
            &new_cnonce(),
        ))
    }

    fn store_challenge(&self, challenge: DigestChallenge) {
        if let Ok(mut guard) = self.auth.lock() {
            *guard = Some(AuthState { challenge, nc: 0 });
        }
    }

    async fn send_get(&self, url: &str, uri: &str) -> Result<reqwest::Response> {
        let mut req = self.client.get(url);
        if let Some(auth) = self.next_authorization(uri) {
            req = req.header(AUTHORIZATION, auth);
        }
        req.send().await.map_err(|e| {
            if e.is_timeout() {
                AmbiError::Timeout {
                    operation: "tv request",
                    elapsed: self.config.request_timeout,
                }
            } else {
                AmbiError::Connect {
                    target: url.to_string(),
                    detail: e.to_string(),
                }
            }
        })
    }

    /// GET `{base_url}/{path}` and decode the JSON body.
    ///
    /// A `401` carrying a digest challenge is answered once; a second
    /// `401` is reported as [`AmbiError::Http`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.config.base_url(), path);
        let uri = format!("/{}/{}", self.config.api_version, path);

        let mut resp = self.send_get(&url, &uri).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            let header = resp
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned);
            if let Some(header) = header {
                debug!(url = %url, "TV issued a digest challenge");
                self.store_challenge(DigestChallenge::parse(&header)?);
                resp = self.send_get(&url, &uri).await?;
            }
        }

        if !resp.status().is_success() {
            return Err(AmbiError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| AmbiError::Json {
            field: "body".into(),
            detail: e.to_string(),
        })?;

        serde_json::from_slice(&bytes).map_err(|e| AmbiError::Json {
            field: path.to_string(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl TvClient for PhilipsTv {
    async fn update(&self) -> Result<()> {
        self.get_json::<serde_json::Value>("system").await.map(|_| ())
    }

    async fn ambilight_configuration(&self) -> Result<AmbilightConfiguration> {
        self.get_json("ambilight/currentconfiguration").await
    }

    async fn ambilight_measured(&self) -> Result<AmbilightLayers> {
        self.get_json("ambilight/measured").await
    }

    async fn ambilight_processed(&self) -> Result<AmbilightLayers> {
        self.get_json("ambilight/processed").await
    }
}

/// Builder for [`PhilipsTv`].
///
/// # Example
/// ```rust,ignore
/// let tv = PhilipsTv::builder("192.168.1.40")
///     .credentials("user", "secret")
///     .request_timeout(Duration::from_secs(5))
///     .build()?;
/// ```
pub struct PhilipsTvBuilder {
    config: TvConfig,
}

impl PhilipsTvBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: TvConfig::new(host),
        }
    }

    /// Override the API version (default 6).
    pub fn api_version(mut self, version: u8) -> Self {
        self.config.api_version = version;
        self
    }

    /// Digest credentials obtained when pairing with the TV.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// Override the TCP connect timeout (default 3 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Override the per-request timeout (default 5 s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Consume the builder and construct a [`PhilipsTv`].
    ///
    /// The TV serves a self-signed certificate, so certificate validation
    /// is disabled for this client only.
    ///
    /// # Errors
    /// Returns [`AmbiError::Config`] if the HTTP client cannot be built.
    pub fn build(self) -> Result<PhilipsTv> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| AmbiError::Config(format!("cannot build TV client: {e}")))?;

        Ok(PhilipsTv {
            config: self.config,
            client,
            auth: Mutex::new(None),
        })
    }
}
