//! Configuration management
//!
//! Provides configuration loading from environment variables, configuration
//! files, and command-line overrides for the session provider.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// Helper functions for serde defaults
fn default_base_url() -> String {
    "https://chat.openai.com".to_string()
}

fn default_session_lifetime() -> Duration {
    Duration::from_secs(600)
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/124.0.0.0 Safari/537.36"
            .to_string(),
    ]
}

fn default_locales() -> Vec<String> {
    vec!["en-US".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pow_max_attempts() -> u32 {
    500_000
}

// Duration serialization module
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Main configuration settings for the session provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Backend endpoint configuration
    #[serde(default)]
    pub backend: BackendSettings,
    /// Session lifecycle configuration
    #[serde(default)]
    pub session: SessionSettings,
    /// Network configuration
    #[serde(default)]
    pub network: NetworkSettings,
    /// Identity pool configuration
    #[serde(default)]
    pub identity: IdentitySettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Backend endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the conversational backend
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// How long a negotiated session stays valid
    #[serde(with = "duration_secs", default = "default_session_lifetime")]
    pub lifetime: Duration,
    /// Upper bound on proof-of-work nonce attempts before giving up
    #[serde(default = "default_pow_max_attempts")]
    pub pow_max_attempts: u32,
}

/// Network and proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// HTTPS proxy URL, used as the pool's egress when no pool entries exist
    #[serde(default)]
    pub https_proxy: Option<String>,
    /// HTTP proxy URL
    #[serde(default)]
    pub http_proxy: Option<String>,
    /// All protocols proxy URL
    #[serde(default)]
    pub all_proxy: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Request timeout in seconds, applied to the negotiation exchange
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Identity pool configuration
///
/// The pool crosses every egress entry with every browser profile; an empty
/// egress list means direct egress. Sessions always consume a full identity
/// (egress + user agent + locale) together so headers and transport agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Proxy URLs to rotate through (http, https or socks5)
    #[serde(default)]
    pub egress: Vec<String>,
    /// Browser user-agent strings to impersonate
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    /// Locales paired with the user agents (cycled when shorter)
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lifetime: default_session_lifetime(),
            pow_max_attempts: default_pow_max_attempts(),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            https_proxy: None,
            http_proxy: None,
            all_proxy: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            egress: Vec::new(),
            user_agents: default_user_agents(),
            locales: default_locales(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            verbose: false,
        }
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut settings = Self::default();

        if let Ok(base_url) = std::env::var("SENTINEL_BASE_URL") {
            settings.backend.base_url = base_url;
        }

        if let Ok(lifetime) = std::env::var("SENTINEL_SESSION_LIFETIME") {
            let lifetime_secs: u64 = lifetime.parse().map_err(|e| {
                crate::Error::config(
                    "SENTINEL_SESSION_LIFETIME",
                    &format!("Invalid lifetime: {}", e),
                )
            })?;
            settings.session.lifetime = Duration::from_secs(lifetime_secs);
        }

        if let Ok(timeout) = std::env::var("SENTINEL_REQUEST_TIMEOUT") {
            settings.network.request_timeout = timeout.parse().map_err(|e| {
                crate::Error::config(
                    "SENTINEL_REQUEST_TIMEOUT",
                    &format!("Invalid timeout: {}", e),
                )
            })?;
        }

        // Proxy settings from the conventional environment variables
        settings.network.https_proxy = std::env::var("HTTPS_PROXY").ok();
        settings.network.http_proxy = std::env::var("HTTP_PROXY").ok();
        settings.network.all_proxy = std::env::var("ALL_PROXY").ok();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            settings.logging.level = level;
        }

        if let Ok(verbose) = std::env::var("VERBOSE") {
            settings.logging.verbose = verbose.parse().unwrap_or(false);
        }

        Ok(settings)
    }

    /// Load settings from configuration file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config("file", &format!("Failed to read config file: {}", e))
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| {
            crate::Error::config("file", &format!("Failed to parse config file: {}", e))
        })?;

        Ok(settings)
    }

    /// Merge settings with environment variable overrides
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        let env_settings = Self::from_env()?;

        if env_settings.backend.base_url != Self::default().backend.base_url {
            self.backend.base_url = env_settings.backend.base_url;
        }

        if env_settings.session.lifetime != Self::default().session.lifetime {
            self.session.lifetime = env_settings.session.lifetime;
        }

        if env_settings.network.request_timeout != Self::default().network.request_timeout {
            self.network.request_timeout = env_settings.network.request_timeout;
        }

        // Proxy settings always override when present
        if env_settings.network.https_proxy.is_some() {
            self.network.https_proxy = env_settings.network.https_proxy;
        }
        if env_settings.network.http_proxy.is_some() {
            self.network.http_proxy = env_settings.network.http_proxy;
        }
        if env_settings.network.all_proxy.is_some() {
            self.network.all_proxy = env_settings.network.all_proxy;
        }

        Ok(self)
    }

    /// Get effective fallback proxy URL based on priority
    ///
    /// Used to seed the identity pool when no explicit egress list is
    /// configured. HTTPS takes precedence over HTTP, then ALL_PROXY.
    pub fn get_proxy_url(&self) -> Option<String> {
        self.network
            .https_proxy
            .as_ref()
            .or(self.network.http_proxy.as_ref())
            .or(self.network.all_proxy.as_ref())
            .cloned()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> crate::Result<()> {
        let base = url::Url::parse(&self.backend.base_url).map_err(|e| {
            crate::Error::config(
                "base_url",
                &format!("Invalid base URL '{}': {}", self.backend.base_url, e),
            )
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(crate::Error::config(
                "base_url",
                &format!("Unsupported scheme '{}'", base.scheme()),
            ));
        }

        if self.session.lifetime.is_zero() {
            return Err(crate::Error::config(
                "lifetime",
                "Invalid session lifetime: cannot be 0",
            ));
        }

        if self.network.request_timeout == 0 {
            return Err(crate::Error::config(
                "request_timeout",
                "Invalid request timeout: cannot be 0",
            ));
        }

        if self.identity.user_agents.is_empty() {
            return Err(crate::Error::config(
                "user_agents",
                "Identity pool needs at least one user agent",
            ));
        }

        if self.identity.locales.is_empty() {
            return Err(crate::Error::config(
                "locales",
                "Identity pool needs at least one locale",
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(crate::Error::config(
                    "log_level",
                    &format!("Invalid log level: {}", self.logging.level),
                ));
            }
        }

        // Validate proxy URLs if present
        let egress_urls = self.identity.egress.iter().map(|u| ("egress", u));
        let env_proxies = [
            ("https_proxy", &self.network.https_proxy),
            ("http_proxy", &self.network.http_proxy),
            ("all_proxy", &self.network.all_proxy),
        ];
        for (name, url_str) in egress_urls.chain(
            env_proxies
                .iter()
                .filter_map(|(name, opt)| opt.as_ref().map(|u| (*name, u))),
        ) {
            if let Err(e) = url::Url::parse(url_str) {
                return Err(crate::Error::config(
                    name,
                    &format!("Invalid proxy URL '{}': {}", url_str, e),
                ));
            }
        }

        Ok(())
    }
}
