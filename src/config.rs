//! Configuration for the echo servers and clients.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values, and every value
//! has a default, so running a binary with no arguments uses the fixed
//! endpoints (TCP 8080, UDP 8081).

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default TCP echo port.
pub const DEFAULT_TCP_PORT: u16 = 8080;

/// Default UDP echo port.
pub const DEFAULT_UDP_PORT: u16 = 8081;

/// Default maximum number of concurrent workers per server.
pub const DEFAULT_MAX_WORKERS: usize = 10_000;

/// Which of the four executables is being configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    TcpServer,
    TcpClient,
    UdpServer,
    UdpClient,
}

impl Endpoint {
    fn is_server(self) -> bool {
        matches!(self, Endpoint::TcpServer | Endpoint::UdpServer)
    }

    /// Servers bind the IPv6 wildcard, which also accepts IPv4 clients.
    fn default_host(self) -> &'static str {
        if self.is_server() {
            "::"
        } else {
            "localhost"
        }
    }

    /// Time given to in-flight work when the endpoint stops.
    fn default_grace(self) -> Duration {
        if self.is_server() {
            Duration::from_secs(5)
        } else {
            Duration::from_secs(2)
        }
    }
}

/// Command-line arguments shared by all four binaries
#[derive(Parser, Debug)]
#[command(author = "twin-echo authors")]
#[command(version = "0.1.0")]
#[command(about = "Line echo over TCP, datagram echo over UDP", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind (servers) or connect to (clients)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to bind (servers) or connect to (clients)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum concurrent connections/datagrams in flight (0 = unbounded)
    #[arg(short = 'w', long)]
    pub max_workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub tcp: TcpSection,
    #[serde(default)]
    pub udp: UdpSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[tcp]` section
#[derive(Debug, Deserialize, Default)]
pub struct TcpSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_workers: Option<usize>,
}

/// `[udp]` section
#[derive(Debug, Deserialize)]
pub struct UdpSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_workers: Option<usize>,
    /// Client receive timeout in milliseconds
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
}

impl Default for UdpSection {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            max_workers: None,
            recv_timeout_ms: default_recv_timeout_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_recv_timeout_ms() -> u64 {
    5_000
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Endpoint::TcpServer => "tcp-server",
            Endpoint::TcpClient => "tcp-client",
            Endpoint::UdpServer => "udp-server",
            Endpoint::UdpClient => "udp-client",
        };
        f.write_str(name)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration for one endpoint
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Endpoint,
    pub host: String,
    pub port: u16,
    /// Semaphore size for server workers; `0` means unbounded.
    pub max_workers: usize,
    /// UDP client receive window.
    pub recv_timeout: Duration,
    pub shutdown_grace: Duration,
    pub log_level: String,
}

impl Config {
    /// Load configuration for `endpoint` from process args and optional TOML file.
    pub fn load(endpoint: Endpoint) -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::resolve(cli, toml_config, endpoint))
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    pub fn resolve(cli: CliArgs, toml_config: TomlConfig, endpoint: Endpoint) -> Self {
        let (host, port, max_workers, default_port) = match endpoint {
            Endpoint::TcpServer | Endpoint::TcpClient => (
                toml_config.tcp.host,
                toml_config.tcp.port,
                toml_config.tcp.max_workers,
                DEFAULT_TCP_PORT,
            ),
            Endpoint::UdpServer | Endpoint::UdpClient => (
                toml_config.udp.host,
                toml_config.udp.port,
                toml_config.udp.max_workers,
                DEFAULT_UDP_PORT,
            ),
        };

        Config {
            endpoint,
            host: cli
                .host
                .or(host)
                .unwrap_or_else(|| endpoint.default_host().to_string()),
            port: cli.port.or(port).unwrap_or(default_port),
            max_workers: cli
                .max_workers
                .or(max_workers)
                .unwrap_or(DEFAULT_MAX_WORKERS),
            recv_timeout: Duration::from_millis(toml_config.udp.recv_timeout_ms),
            shutdown_grace: endpoint.default_grace(),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    /// Loopback endpoint with short timeouts.
    #[cfg(test)]
    pub(crate) fn loopback(endpoint: Endpoint, port: u16) -> Self {
        Config {
            endpoint,
            host: "127.0.0.1".to_string(),
            port,
            max_workers: 64,
            recv_timeout: Duration::from_millis(50),
            shutdown_grace: Duration::from_millis(500),
            log_level: "debug".to_string(),
        }
    }

    /// `host:port` for display, with IPv6 literals bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["twin-echo"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_match_fixed_endpoints() {
        let tcp = Config::resolve(cli(&[]), TomlConfig::default(), Endpoint::TcpServer);
        assert_eq!(tcp.endpoint, Endpoint::TcpServer);
        assert_eq!(tcp.endpoint.to_string(), "tcp-server");
        assert_eq!(tcp.address(), "[::]:8080");
        assert_eq!(tcp.shutdown_grace, Duration::from_secs(5));

        let udp = Config::resolve(cli(&[]), TomlConfig::default(), Endpoint::UdpClient);
        assert_eq!(udp.endpoint.to_string(), "udp-client");
        assert_eq!(udp.address(), "localhost:8081");
        assert_eq!(udp.recv_timeout, Duration::from_secs(5));
        assert_eq!(udp.shutdown_grace, Duration::from_secs(2));
        assert_eq!(udp.log_level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [tcp]
            host = "127.0.0.1"
            port = 9000
            max_workers = 16

            [udp]
            port = 9001
            recv_timeout_ms = 250

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tcp.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.tcp.port, Some(9000));
        assert_eq!(config.tcp.max_workers, Some(16));
        assert_eq!(config.udp.port, Some(9001));
        assert_eq!(config.udp.recv_timeout_ms, 250);
        assert_eq!(config.logging.level, "debug");

        let resolved = Config::resolve(cli(&[]), config, Endpoint::UdpClient);
        assert_eq!(resolved.address(), "localhost:9001");
        assert_eq!(resolved.recv_timeout, Duration::from_millis(250));
        assert_eq!(resolved.log_level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let config: TomlConfig = toml::from_str("[tcp]\nport = 9000\nmax_workers = 4\n").unwrap();
        let resolved = Config::resolve(
            cli(&["-H", "::1", "-p", "7000", "--log-level", "warn"]),
            config,
            Endpoint::TcpClient,
        );
        assert_eq!(resolved.address(), "[::1]:7000");
        assert_eq!(resolved.max_workers, 4);
        assert_eq!(resolved.log_level, "warn");
    }
}
