//! Command-line and environment configuration
//!
//! Flags are parsed with clap; each can also come from the environment. The
//! raw values are validated into a [`ServerConfig`] before anything binds.

use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{FileStore, StalePolicy};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A duration flag could not be parsed
    #[error("Invalid duration: '{0}'. Use seconds or a number with s, m, h or d (e.g. 90s, 15m, 3h, 1d)")]
    InvalidDuration(String),

    /// The listen address could not be parsed
    #[error("Invalid listen address: '{0}'")]
    InvalidAddress(String),

    /// A duration flag was zero
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Kiosk dashboard server: weather, headlines and market quotes behind a disk cache
#[derive(Parser, Debug)]
#[command(name = "kioskdash")]
#[command(about = "Kiosk dashboard server with a shared disk cache")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "KIOSK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Cache file path (defaults to the user cache directory)
    #[arg(long, env = "KIOSK_CACHE_FILE", value_name = "PATH")]
    pub cache_file: Option<PathBuf>,

    /// How long cached data stays fresh
    ///
    /// Examples: 90s, 15m, 3h, 1d, or plain seconds
    #[arg(long, env = "KIOSK_CACHE_TTL", default_value = "3h", value_name = "DURATION")]
    pub ttl: String,

    /// How often expired entries are removed (defaults to the TTL)
    #[arg(long, env = "KIOSK_SWEEP_INTERVAL", value_name = "DURATION")]
    pub sweep_interval: Option<String>,

    /// Return an error instead of expired data when a fetch fails
    #[arg(long)]
    pub no_stale: bool,

    /// City shown on the weather page
    #[arg(long, env = "KIOSK_CITY", default_value = "Ho Chi Minh City")]
    pub city: String,

    /// Language of the weather descriptions
    #[arg(long, env = "KIOSK_LANG", default_value = "vi")]
    pub lang: String,

    /// OpenWeather API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub openweather_key: Option<String>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Validated configuration for server startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub cache_file: PathBuf,
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub stale_policy: StalePolicy,
    pub city: String,
    pub lang: String,
    pub openweather_key: Option<String>,
    pub log_format: LogFormat,
}

/// Parses `90s`, `15m`, `3h`, `1d` or a bare number of seconds
pub fn parse_duration(s: &str) -> Result<Duration, CliError> {
    let trimmed = s.trim();
    let (digits, unit) = match trimmed.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&trimmed[..i], c.to_ascii_lowercase()),
        _ => (trimmed, 's'),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| CliError::InvalidDuration(s.to_string()))?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(CliError::InvalidDuration(s.to_string())),
    };
    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| CliError::InvalidDuration(s.to_string()))
}

fn nonzero(duration: Duration, flag: &'static str) -> Result<Duration, CliError> {
    if duration.is_zero() {
        Err(CliError::ZeroInterval(flag))
    } else {
        Ok(duration)
    }
}

impl ServerConfig {
    /// Validates parsed CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let ip: IpAddr = cli
            .host
            .trim()
            .parse()
            .map_err(|_| CliError::InvalidAddress(cli.host.clone()))?;

        let ttl = nonzero(parse_duration(&cli.ttl)?, "--ttl")?;
        let sweep_interval = match &cli.sweep_interval {
            Some(raw) => nonzero(parse_duration(raw)?, "--sweep-interval")?,
            None => ttl,
        };

        let cache_file = cli
            .cache_file
            .clone()
            .or_else(FileStore::default_path)
            .unwrap_or_else(|| PathBuf::from("cache.json"));

        let stale_policy = if cli.no_stale {
            StalePolicy::Propagate
        } else {
            StalePolicy::ServeStale
        };

        Ok(ServerConfig {
            addr: SocketAddr::new(ip, cli.port),
            cache_file,
            ttl,
            sweep_interval,
            stale_policy,
            city: cli.city.clone(),
            lang: cli.lang.clone(),
            openweather_key: cli.openweather_key.clone().filter(|k| !k.trim().is_empty()),
            log_format: cli.log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    /// Arguments as parsed with no flags and no environment
    fn cli() -> Cli {
        Cli {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cache_file: None,
            ttl: "3h".to_string(),
            sweep_interval: None,
            no_stale: false,
            city: "Ho Chi Minh City".to_string(),
            lang: "vi".to_string(),
            openweather_key: None,
            log_format: LogFormat::Pretty,
        }
    }

    fn default_of(arg: &str) -> String {
        let command = Cli::command();
        let arg = command
            .get_arguments()
            .find(|a| a.get_id() == arg)
            .unwrap_or_else(|| panic!("no argument {}", arg));
        arg.get_default_values()
            .iter()
            .map(|v| v.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("3h").unwrap(), Duration::from_secs(10_800));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("10800").unwrap(), Duration::from_secs(10_800));
        assert_eq!(parse_duration(" 2H ").unwrap(), Duration::from_secs(7_200));
    }

    #[test]
    fn test_parse_duration_invalid() {
        for bad in ["", "h", "3w", "-5s", "1.5h", "three hours"] {
            let err = parse_duration(bad).unwrap_err();
            assert!(matches!(err, CliError::InvalidDuration(_)), "{:?} accepted", bad);
        }
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration("18446744073709551615d").is_err());
    }

    #[test]
    fn test_declared_defaults_match_base_arguments() {
        let base = cli();
        assert_eq!(default_of("host"), base.host);
        assert_eq!(default_of("port"), base.port.to_string());
        assert_eq!(default_of("ttl"), base.ttl);
        assert_eq!(default_of("city"), base.city);
        assert_eq!(default_of("lang"), base.lang);
        assert_eq!(default_of("log_format"), "pretty");
        assert_eq!(default_of("sweep_interval"), "");
    }

    #[test]
    fn test_ttl_default_is_three_hours() {
        let config = ServerConfig::from_cli(&cli()).unwrap();
        assert_eq!(config.ttl, Duration::from_secs(3 * 60 * 60));
        assert_eq!(config.sweep_interval, config.ttl);
        assert_eq!(config.stale_policy, StalePolicy::ServeStale);
    }

    #[test]
    fn test_sweep_interval_override() {
        let cli = Cli {
            ttl: "15m".to_string(),
            sweep_interval: Some("1m".to_string()),
            ..cli()
        };
        let config = ServerConfig::from_cli(&cli).unwrap();
        assert_eq!(config.ttl, Duration::from_secs(900));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let zero_ttl = Cli {
            ttl: "0".to_string(),
            ..cli()
        };
        let err = ServerConfig::from_cli(&zero_ttl).unwrap_err();
        assert!(matches!(err, CliError::ZeroInterval("--ttl")));

        let zero_sweep = Cli {
            sweep_interval: Some("0s".to_string()),
            ..cli()
        };
        let err = ServerConfig::from_cli(&zero_sweep).unwrap_err();
        assert!(err.to_string().contains("--sweep-interval"));
    }

    #[test]
    fn test_address_from_host_and_port() {
        let cli = Cli {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..cli()
        };
        let config = ServerConfig::from_cli(&cli).unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_ipv6_host() {
        let cli = Cli {
            host: "::1".to_string(),
            port: 9000,
            ..cli()
        };
        let config = ServerConfig::from_cli(&cli).unwrap();
        assert!(config.addr.is_ipv6());
        assert_eq!(config.addr.port(), 9000);
    }

    #[test]
    fn test_invalid_host_rejected() {
        let cli = Cli {
            host: "not an address".to_string(),
            ..cli()
        };
        let err = ServerConfig::from_cli(&cli).unwrap_err();
        assert!(matches!(err, CliError::InvalidAddress(_)));
    }

    #[test]
    fn test_no_stale_flag() {
        let cli = Cli {
            no_stale: true,
            ..cli()
        };
        let config = ServerConfig::from_cli(&cli).unwrap();
        assert_eq!(config.stale_policy, StalePolicy::Propagate);
    }

    #[test]
    fn test_explicit_cache_file() {
        let cli = Cli {
            cache_file: Some(PathBuf::from("/tmp/kiosk/cache.json")),
            ..cli()
        };
        let config = ServerConfig::from_cli(&cli).unwrap();
        assert_eq!(config.cache_file, PathBuf::from("/tmp/kiosk/cache.json"));
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let blank = Cli {
            openweather_key: Some("  ".to_string()),
            ..cli()
        };
        assert!(ServerConfig::from_cli(&blank).unwrap().openweather_key.is_none());

        let set = Cli {
            openweather_key: Some("abc123".to_string()),
            ..cli()
        };
        assert_eq!(
            ServerConfig::from_cli(&set).unwrap().openweather_key.as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_flags_parse_into_fields() {
        let cli = Cli::parse_from([
            "kioskdash",
            "--host",
            "::1",
            "-p",
            "8080",
            "--ttl",
            "15m",
            "--sweep-interval",
            "1m",
            "--no-stale",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.host, "::1");
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.ttl, "15m");
        assert_eq!(cli.sweep_interval.as_deref(), Some("1m"));
        assert!(cli.no_stale);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
