use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::session;

/// Top-level configuration loaded from `config.yaml`.
///
/// Every section is optional; a missing file yields [`Config::default`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat-completion service.
    #[serde(default)]
    pub model: ModelConfig,
    /// Tuition backend API.
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address for the HTTP gateway.
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_addr() }
    }
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3001))
}

/// OpenAI-compatible completion endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Full chat-completions URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model name to request.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (plain text or env-var reference like `$GROQ_API_KEY`).
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Per-request timeout in seconds.  Absent means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: default_api_key(),
            timeout_secs: None,
        }
    }
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".into()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}

fn default_api_key() -> String {
    "$GROQ_API_KEY".into()
}

impl ModelConfig {
    /// Resolve the API key: a `$VAR` value reads the environment,
    /// anything else is used as-is.  Unset variables resolve to "".
    pub fn resolved_api_key(&self) -> String {
        match self.api_key.strip_prefix('$') {
            Some(var) => std::env::var(var).unwrap_or_default(),
            None => self.api_key.clone(),
        }
    }

    /// The resolved API key, or an error when it is empty.
    pub fn api_key(&self) -> anyhow::Result<String> {
        let key = self.resolved_api_key();
        if key.trim().is_empty() {
            anyhow::bail!(
                "config: model.api_key resolves to an empty value ({})",
                self.api_key
            );
        }
        Ok(key)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Tuition backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL that every tool route is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5025/api/v1".into()
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Session store bounds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionsConfig {
    /// Maximum number of live sessions before the least recently
    /// touched one is evicted.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Idle time after which a session is forgotten.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_capacity() -> usize {
    session::DEFAULT_CAPACITY
}

fn default_ttl_secs() -> u64 {
    session::DEFAULT_TTL.as_secs()
}

impl SessionsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Config {
    /// Read and parse a YAML configuration file, then apply environment
    /// overrides and validate.  A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Config> {
        let mut config = match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_yaml_ng::from_str::<Config>(&contents)
                .with_context(|| format!("failed to parse config YAML: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults");
                Config::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read config file: {}", path.display()));
            }
        };

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        tracing::debug!(
            addr = %config.server.addr,
            backend = %config.backend.base_url,
            model = %config.model.model,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Apply `PORT`, `TUITION_ADDR` and `TUITION_BACKEND_URL` from
    /// `lookup`.  `PORT` listens on all interfaces; a full `TUITION_ADDR`
    /// wins over it.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a port number: {port}"))?;
            self.server.addr = SocketAddr::from(([0, 0, 0, 0], port));
        }
        if let Some(addr) = lookup("TUITION_ADDR").filter(|v| !v.trim().is_empty()) {
            self.server.addr = addr
                .trim()
                .parse()
                .with_context(|| format!("TUITION_ADDR is not a socket address: {addr}"))?;
        }
        if let Some(url) = lookup("TUITION_BACKEND_URL").filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = url.trim().to_string();
        }
        Ok(())
    }

    /// Validate semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sessions.capacity == 0 {
            anyhow::bail!("config: sessions.capacity must be greater than zero");
        }
        if self.sessions.ttl_secs == 0 {
            anyhow::bail!("config: sessions.ttl_secs must be greater than zero");
        }
        if self.model.model.trim().is_empty() {
            anyhow::bail!("config: model.model must not be empty");
        }
        reqwest::Url::parse(&self.model.endpoint)
            .with_context(|| format!("config: model.endpoint is not a URL: {}", self.model.endpoint))?;
        reqwest::Url::parse(&self.backend.base_url).with_context(|| {
            format!("config: backend.base_url is not a URL: {}", self.backend.base_url)
        })?;
        Ok(())
    }
}
