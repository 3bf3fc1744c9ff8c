//! Application configuration loading from config.toml
//!
//! Every section has defaults, so a missing file yields a working
//! development setup. Selected values can be overridden from the environment
//! (populated from `.env` by `dotenvy` in `main`).

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Store-wide commerce settings
    pub store: StoreConfig,
    /// Admin panel access
    pub admin: AdminConfig,
    /// Where uploaded product images are written
    pub uploads: UploadConfig,
    /// Homepage sections created on first start
    pub homepage_sections: Vec<SectionSeed>,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Store-wide commerce settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store display name
    pub name: String,
    /// ISO currency code shown to clients
    pub currency: String,
    /// Flat shipping fee used when the `shipping_fee` setting is absent
    pub shipping_fee: f64,
    /// Stock level at or below which a product is reported as low
    pub low_stock_threshold: i64,
    /// Default page size for listings
    pub page_size: u64,
    /// Upper bound for client-requested page sizes
    pub max_page_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "Storefront".to_string(),
            currency: "USD".to_string(),
            shipping_fee: 0.0,
            low_stock_threshold: 5,
            page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Admin panel access
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required on `/api/admin` routes; admin API is disabled when empty
    pub token: String,
}

/// Storage for uploaded files
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory that stored paths such as `products/<name>` are relative to
    pub dir: PathBuf,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/uploads"),
        }
    }
}

/// A homepage section created on first start
#[derive(Debug, Clone, Deserialize)]
pub struct SectionSeed {
    /// Section key (e.g. `"hero"`)
    pub key: String,
    /// Initial title
    pub title: String,
    /// Initial position
    #[serde(default)]
    pub sort_order: i32,
}

/// Parses configuration from TOML text.
///
/// # Errors
/// Returns an error if the TOML syntax is invalid or a value has the wrong type.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from a TOML file, falling back to defaults when the file is absent.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("{} not found, using default configuration", path.display());
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    let config = parse_config(&contents)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Applies `STOREFRONT_PORT`, `STOREFRONT_ADMIN_TOKEN` and `STOREFRONT_UPLOAD_DIR`
/// overrides from the environment.
///
/// # Errors
/// Returns an error if `STOREFRONT_PORT` is set but not a valid port number.
pub fn apply_env_overrides(mut config: AppConfig) -> Result<AppConfig> {
    if let Ok(port) = std::env::var("STOREFRONT_PORT") {
        config.server.port = port.parse().map_err(|e| Error::Config {
            message: format!("Invalid STOREFRONT_PORT '{port}': {e}"),
        })?;
    }
    if let Ok(token) = std::env::var("STOREFRONT_ADMIN_TOKEN") {
        config.admin.token = token;
    }
    if let Ok(dir) = std::env::var("STOREFRONT_UPLOAD_DIR") {
        config.uploads.dir = PathBuf::from(dir);
    }
    Ok(config)
}

/// Loads `config.toml` from the working directory and applies env overrides.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("STOREFRONT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    apply_env_overrides(load_config(path)?)
}
