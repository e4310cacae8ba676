//! Configuration Module
//!
//! Command line options (with environment fallbacks) and the values the
//! server core consumes once they are parsed.

use std::sync::OnceLock;
use std::time::Duration;

use clap::Parser;
use regex::Regex;

use crate::error::{Result, SkkError};

/// Default listen port of the SKK server.
pub const DEFAULT_PORT: u16 = 55100;

/// Default conversion endpoint.
pub const DEFAULT_BACKEND_URL: &str = "http://www.social-ime.com";

/// Server configuration parameters.
///
/// Immutable once the server starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen hostname or address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// HTTP proxy URL (`http://host:port`), None = direct connection
    pub proxy: Option<String>,
    /// How long a lookup result (including a failed one) is reused
    pub cache_ttl: Duration,
    /// Base URL of the conversion backend
    pub backend_url: String,
    /// Upper bound on one backend call, connect through body
    pub backend_timeout: Duration,
    /// Cap on cached queries, None = unbounded
    pub max_entries: Option<usize>,
    /// Cap on concurrently served connections, None = unbounded
    pub max_connections: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            proxy: None,
            cache_ttl: Duration::from_secs(3600),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_timeout: Duration::from_secs(10),
            max_entries: None,
            max_connections: None,
        }
    }
}

/// Command line arguments.
///
/// `-h` selects the listen host, so help is only reachable as `--help`.
#[derive(Parser, Debug)]
#[command(name = "social_skk", version, disable_help_flag = true)]
#[command(about = "SKK server backed by the Social IME conversion API")]
pub struct Cli {
    /// Listen port number
    #[arg(short, long, env = "SOCIALSKK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Listen hostname
    #[arg(short, long, env = "SOCIALSKK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP proxy server, e.g. "http://proxy.example.com:8080"
    #[arg(short = 'x', long, env = "SOCIALSKK_PROXY")]
    pub proxy: Option<String>,

    /// Cache keep time, e.g. "1h", "30m", "2d", "90"
    #[arg(short, long, env = "SOCIALSKK_CACHE_TIME", default_value = "1h")]
    pub cache_time: String,

    /// Base URL of the conversion API
    #[arg(long, env = "SOCIALSKK_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Timeout for one conversion request
    #[arg(long, env = "SOCIALSKK_TIMEOUT", default_value = "10s")]
    pub timeout: String,

    /// Maximum number of cached queries (unbounded when omitted)
    #[arg(long, env = "SOCIALSKK_MAX_ENTRIES")]
    pub max_entries: Option<usize>,

    /// Maximum number of concurrent connections (unbounded when omitted)
    #[arg(long, env = "SOCIALSKK_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    /// Validates the raw arguments and turns them into a [`Config`].
    pub fn into_config(self) -> Result<Config> {
        let cache_ttl = parse_duration(&self.cache_time)?;
        let backend_timeout = parse_duration(&self.timeout)?;
        if backend_timeout.is_zero() {
            return Err(SkkError::Config("timeout must be positive".to_string()));
        }

        Ok(Config {
            host: self.host,
            port: self.port,
            proxy: self.proxy.as_deref().map(normalize_proxy).transpose()?,
            cache_ttl,
            backend_url: self.backend_url.trim_end_matches('/').to_string(),
            backend_timeout,
            max_entries: self.max_entries.filter(|&n| n > 0),
            max_connections: self.max_connections.filter(|&n| n > 0),
        })
    }
}

static DURATION_RE: OnceLock<Regex> = OnceLock::new();

/// Duration pattern, compiled on first use.
fn duration_regex() -> Result<&'static Regex> {
    if let Some(re) = DURATION_RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"(\d+)([dhms]?)")
        .map_err(|e| SkkError::Config(format!("Invalid regex: {}", e)))?;
    Ok(DURATION_RE.get_or_init(|| re))
}

/// Parses a human duration like "1h", "30m", "2d", "45s" or "90".
///
/// Only the first `<digits><unit>` group counts; a bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let caps = duration_regex()?.captures(input).ok_or_else(|| {
        SkkError::Config(format!(
            "Invalid duration '{}'. Expected a number with an optional d/h/m/s suffix",
            input
        ))
    })?;

    let n: u64 = caps[1]
        .parse()
        .map_err(|_| SkkError::Config(format!("Duration out of range: '{}'", input)))?;

    let multiplier = match &caps[2] {
        "d" => 24 * 60 * 60,
        "h" => 60 * 60,
        "m" => 60,
        _ => 1,
    };

    n.checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| SkkError::Config(format!("Duration out of range: '{}'", input)))
}

/// Accepts `host:port` or a full `http://host:port` URL.
pub fn normalize_proxy(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SkkError::Config("proxy address is empty".to_string()));
    }

    let url = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    // Reject addresses reqwest would refuse later.
    reqwest::Proxy::http(&url)
        .map_err(|e| SkkError::Config(format!("Invalid proxy '{}': {}", raw, e)))?;

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 55100);
        assert!(config.proxy.is_none());
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.backend_timeout, Duration::from_secs(10));
        assert!(config.max_entries.is_none());
        assert!(config.max_connections.is_none());
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172_800));
    }

    #[test]
    fn test_parse_duration_first_group_only() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(matches!(parse_duration("soon"), Err(SkkError::Config(_))));
        assert!(matches!(parse_duration(""), Err(SkkError::Config(_))));
    }

    #[test]
    fn test_duration_regex_is_compiled_once() {
        let first = duration_regex().unwrap();
        parse_duration("5m").unwrap();
        let second = duration_regex().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_normalize_proxy() {
        assert_eq!(
            normalize_proxy("proxy.example.com:8080").unwrap(),
            "http://proxy.example.com:8080"
        );
        assert_eq!(
            normalize_proxy("http://proxy.example.com:8080").unwrap(),
            "http://proxy.example.com:8080"
        );
        assert!(normalize_proxy("  ").is_err());
    }

    #[test]
    fn test_cli_into_config() {
        let cli = Cli::try_parse_from([
            "social_skk",
            "-p",
            "1178",
            "-h",
            "127.0.0.1",
            "-x",
            "proxy.local:3128",
            "-c",
            "30m",
        ])
        .unwrap();

        let config = cli.into_config().unwrap();
        assert_eq!(config.port, 1178);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.proxy.as_deref(), Some("http://proxy.local:3128"));
        assert_eq!(config.cache_ttl, Duration::from_secs(1800));
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
    }

    #[test]
    fn test_cli_zero_caps_mean_unbounded() {
        let cli = Cli::try_parse_from([
            "social_skk",
            "--max-entries",
            "0",
            "--max-connections",
            "0",
        ])
        .unwrap();

        let config = cli.into_config().unwrap();
        assert!(config.max_entries.is_none());
        assert!(config.max_connections.is_none());
    }
}
