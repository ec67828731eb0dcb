mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Proxy server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served at `/` for the front-end
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "public".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// bilibili endpoints and outbound request settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Video info endpoint, called with `?bvid=<id>`
    #[serde(default = "default_view_url")]
    pub view_url: String,
    /// Comment host; tracks live at `<base>/<cid>.xml`
    #[serde(default = "default_comment_base_url")]
    pub comment_base_url: String,
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub headers: BrowserHeadersConfig,
}

fn default_view_url() -> String {
    "https://api.bilibili.com/x/web-interface/view".to_string()
}

fn default_comment_base_url() -> String {
    "https://comment.bilibili.com".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            view_url: default_view_url(),
            comment_base_url: default_comment_base_url(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            headers: BrowserHeadersConfig::default(),
        }
    }
}

impl UpstreamConfig {
    /// Returns the comment base URL with trailing slash stripped
    pub fn comment_base(&self) -> &str {
        self.comment_base_url.trim_end_matches('/')
    }
}

/// Headers sent with every upstream request so bilibili treats us like its own web player
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserHeadersConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_origin")]
    pub origin: String,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_referer() -> String {
    "https://www.bilibili.com/".to_string()
}

fn default_origin() -> String {
    "https://www.bilibili.com".to_string()
}

impl Default for BrowserHeadersConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            referer: default_referer(),
            origin: default_origin(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load an explicit config file, or the first default location that exists,
    /// or fall back to built-in defaults when there is no file at all
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => {
                let default_paths = ["config.yaml", "config.yml", "./config/config.yaml"];
                for p in default_paths {
                    let path = Path::new(p);
                    if path.exists() {
                        tracing::debug!(path = %path.display(), "Using default config file");
                        return Self::from_file(path);
                    }
                }
                tracing::debug!("No config file found, using built-in defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".to_string()));
        }
        if self.upstream.timeout_seconds == 0 || self.upstream.connect_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "upstream timeouts must be at least one second".to_string(),
            ));
        }

        for (field, value) in [
            ("upstream.view_url", &self.upstream.view_url),
            ("upstream.comment_base_url", &self.upstream.comment_base_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| ConfigError::Validation(format!("{}: {} ({})", field, e, value)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "{} must be an http(s) URL, got {}",
                    field, value
                )));
            }
        }

        let headers = &self.upstream.headers;
        for (field, value) in [
            ("user_agent", &headers.user_agent),
            ("referer", &headers.referer),
            ("origin", &headers.origin),
        ] {
            if reqwest::header::HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::Validation(format!(
                    "upstream.headers.{} is not a valid header value",
                    field
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
