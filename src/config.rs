use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Version information for the proxy
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Global configuration for the proxy
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Script routes, in the order they are listed on the index page
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// HTTP port (default: 8787, set to 0 to disable)
    #[serde(default = "default_listen_port")]
    pub port: u16,

    /// HTTPS port (default: 443 when TLS enabled, set to 0 to disable)
    pub tls_port: Option<u16>,

    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Host name shown in the commands on the index page
    #[serde(default = "default_public_host")]
    pub public_host: String,

    /// User-Agent sent with every upstream request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for establishing an upstream connection
    #[serde(default = "default_upstream_connect_timeout")]
    pub upstream_connect_timeout_secs: u64,

    /// Maximum time to wait for the upstream response head.
    /// The body stream itself is not bounded.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Maximum idle connections per upstream host (default: 10)
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// Idle connection timeout in seconds (default: 90)
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,

    /// Path to TLS certificate file (PEM format)
    pub tls_cert: Option<String>,

    /// Path to TLS private key file (PEM format)
    pub tls_key: Option<String>,
}

impl ServerConfig {
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert.is_some() && self.tls_key.is_some()
    }

    /// Get HTTP port (0 means disabled)
    pub fn http_port(&self) -> u16 {
        self.port
    }

    /// Get HTTPS port (0 means disabled)
    pub fn https_port(&self) -> u16 {
        if !self.tls_enabled() {
            return 0;
        }
        self.tls_port.unwrap_or(443)
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.upstream_connect_timeout_secs == 0 {
            errors.push("server.upstream_connect_timeout_secs must be greater than 0".to_string());
        }
        if self.upstream_timeout_secs == 0 {
            errors.push("server.upstream_timeout_secs must be greater than 0".to_string());
        }
        if self.user_agent.trim().is_empty() {
            errors.push("server.user_agent must not be empty".to_string());
        }
        if self.tls_cert.is_some() != self.tls_key.is_some() {
            errors.push("server.tls_cert and server.tls_key must be set together".to_string());
        }
        if self.http_port() == 0 && self.https_port() == 0 {
            errors.push("no listener enabled: set server.port or configure TLS".to_string());
        }

        errors
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_listen_port(),
            tls_port: None,
            bind: default_bind_address(),
            public_host: default_public_host(),
            user_agent: default_user_agent(),
            upstream_connect_timeout_secs: default_upstream_connect_timeout(),
            upstream_timeout_secs: default_upstream_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

/// A single path → upstream file mapping
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RouteConfig {
    /// Request path, e.g. "/check.py"
    pub path: String,

    /// Fully-qualified upstream URL
    pub url: String,

    /// Optional one-line description shown on the index page
    pub description: Option<String>,
}

impl RouteConfig {
    pub fn new(path: &str, url: &str) -> Self {
        Self {
            path: path.to_string(),
            url: url.to_string(),
            description: None,
        }
    }

    /// Validate this route, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !self.path.starts_with('/') {
            errors.push("path must start with '/'".to_string());
        } else if self.path == "/" {
            errors.push("path '/' is reserved for the index page".to_string());
        }
        if !self.path.chars().all(is_path_char) {
            errors.push(format!(
                "path may only contain ASCII letters, digits and '{}'",
                PATH_PUNCTUATION
            ));
        }

        match reqwest::Url::parse(&self.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(format!("unsupported url scheme '{}'", url.scheme())),
            Err(e) => errors.push(format!("invalid url '{}': {}", self.url, e)),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(format!("route '{}': {}", self.path, errors.join(", ")))
        }
    }
}

/// Punctuation allowed in route paths besides ASCII letters and digits.
/// None of it is HTML-special, so paths render on the index page verbatim.
const PATH_PUNCTUATION: &str = "/-._~%+@:!$()*,;=";

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || PATH_PUNCTUATION.contains(c)
}

fn default_listen_port() -> u16 {
    8787
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_public_host() -> String {
    "localhost".to_string()
}

fn default_user_agent() -> String {
    format!("{}/{}", PKG_NAME, VERSION)
}

fn default_upstream_connect_timeout() -> u64 {
    10
}

fn default_upstream_timeout() -> u64 {
    30 // 30 seconds max for upstream to start responding
}

fn default_pool_max_idle_per_host() -> usize {
    10
}

fn default_pool_idle_timeout() -> u64 {
    90 // Close idle connections after 90 seconds
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = self.server.validate();
        let mut seen = HashSet::new();

        for route in &self.routes {
            if let Err(e) = route.validate() {
                errors.push(e);
            }
            if !seen.insert(route.path.as_str()) {
                errors.push(format!("route '{}': duplicate path", route.path));
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}
