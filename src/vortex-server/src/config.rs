//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::Product;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Public base URL used when building cart links.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Where a resolved link sends the shopper.
    /// Defaults to `{public_url}/checkout`.
    #[serde(default)]
    pub checkout_url: Option<String>,

    /// Cart link configuration.
    #[serde(default)]
    pub links: LinkConfig,

    /// Snapshot store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Shopper cart configuration.
    #[serde(default)]
    pub cart: CartConfig,

    /// CSRF nonce configuration.
    #[serde(default)]
    pub nonce: NonceConfig,

    /// Product catalog.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// CORS origins (empty = allow all).
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Interval between background cleanup passes, in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_body_size() -> usize {
    64 * 1024 // 64KB
}

fn default_request_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_cleanup_interval() -> u64 {
    300 // 5 minutes
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_url: default_public_url(),
            checkout_url: None,
            links: LinkConfig::default(),
            store: StoreConfig::default(),
            cart: CartConfig::default(),
            nonce: NonceConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
            max_body_size: default_max_body_size(),
            request_timeout: default_request_timeout(),
            cors_origins: vec![],
            shutdown_timeout: default_shutdown_timeout(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from `VORTEX_*` environment variables.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(addr) = std::env::var("VORTEX_LISTEN_ADDR") {
            self.listen_addr = addr;
        }

        if let Ok(url) = std::env::var("VORTEX_PUBLIC_URL") {
            self.public_url = url;
        }

        if let Ok(url) = std::env::var("VORTEX_CHECKOUT_URL") {
            self.checkout_url = Some(url);
        }

        if let Ok(ttl) = std::env::var("VORTEX_LINK_TTL") {
            self.links.ttl_secs = ttl
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid VORTEX_LINK_TTL {ttl:?}: {e}"))?;
        }

        if let Ok(path) = std::env::var("VORTEX_STORE_PATH") {
            self.store.backend = StoreBackend::File;
            self.store.path = Some(PathBuf::from(path));
        }

        if let Ok(secret) = std::env::var("VORTEX_NONCE_SECRET") {
            self.nonce.secret = Some(secret);
        }

        if let Ok(path) = std::env::var("VORTEX_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Public base URL without a trailing slash.
    pub fn public_base(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    /// Absolute URL a shopper opens to load a shared cart.
    pub fn link_url(&self, token: &str) -> String {
        format!("{}/vortex/{}", self.public_base(), token)
    }

    /// Where a resolved link redirects.
    pub fn checkout_url(&self) -> String {
        self.checkout_url
            .clone()
            .unwrap_or_else(|| format!("{}/checkout", self.public_base()))
    }

    /// Get request timeout as Duration.
    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn cleanup_interval_duration(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval.max(1))
    }
}

/// Cart link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// How long a link stays usable, in seconds.
    #[serde(default = "default_link_ttl")]
    pub ttl_secs: u64,
    /// Token length; values below 8 are raised to 8.
    #[serde(default = "default_token_length")]
    pub token_length: usize,
    /// Line fields never copied into a snapshot, on top of the built-in list.
    #[serde(default)]
    pub extra_denied_keys: Vec<String>,
}

fn default_link_ttl() -> u64 {
    vortex_cart::DEFAULT_LINK_TTL.as_secs()
}

fn default_token_length() -> usize {
    vortex_cart::DEFAULT_TOKEN_LENGTH
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_link_ttl(),
            token_length: default_token_length(),
            extra_denied_keys: vec![],
        }
    }
}

impl LinkConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Snapshot store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

/// Snapshot store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Directory for the file backend.
    pub path: Option<PathBuf>,
}

/// Shopper cart configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartConfig {
    /// When false, the cart subsystem is treated as unavailable and both
    /// creating and opening links fail.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Carts untouched for this many seconds are dropped.
    #[serde(default = "default_cart_idle_timeout")]
    pub idle_timeout: u64,
}

fn default_cart_idle_timeout() -> u64 {
    7 * 24 * 60 * 60 // 7 days
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_timeout: default_cart_idle_timeout(),
        }
    }
}

impl CartConfig {
    pub fn idle_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }
}

/// CSRF nonce configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceConfig {
    /// HMAC secret. A random one is generated at startup when unset, which
    /// invalidates outstanding nonces on restart.
    #[serde(default)]
    pub secret: Option<String>,
    /// Nonce lifetime in seconds.
    #[serde(default = "default_nonce_lifetime")]
    pub lifetime_secs: u64,
}

fn default_nonce_lifetime() -> u64 {
    24 * 60 * 60
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            secret: None,
            lifetime_secs: default_nonce_lifetime(),
        }
    }
}

/// Product catalog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file holding an array of products. Merged with `products`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Inline products.
    #[serde(default)]
    pub products: Vec<Product>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json or pretty).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.links.ttl_secs, 86_400);
        assert_eq!(config.links.token_length, 8);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.cart.enabled);
    }

    #[test]
    fn test_urls() {
        let mut config = ServerConfig {
            public_url: "https://shop.example/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.link_url("Ab12Cd34"), "https://shop.example/vortex/Ab12Cd34");
        assert_eq!(config.checkout_url(), "https://shop.example/checkout");

        config.checkout_url = Some("https://pay.example/start".to_string());
        assert_eq!(config.checkout_url(), "https://pay.example/start");
    }

    #[test]
    fn test_partial_json() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "links": { "ttl_secs": 60 }, "store": { "backend": "file", "path": "/tmp/v" } }"#,
        )
        .unwrap();
        assert_eq!(config.links.ttl(), Duration::from_secs(60));
        assert_eq!(config.links.token_length, 8);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.public_url, "http://localhost:8080");
    }

    #[test]
    fn test_config_serialization() {
        let config = ServerConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.listen_addr, parsed.listen_addr);
        assert_eq!(config.links.ttl_secs, parsed.links.ttl_secs);
    }
}
