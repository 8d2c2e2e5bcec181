//! Command-line options for the `portmux` binary.

use clap::Parser;
use portmux_server::ServerConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Serve HTTP, WebSocket and Server-Sent Events on one port.
#[derive(Debug, Parser)]
#[command(name = "portmux", version, about)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Period of the SSE broadcast ticker, in milliseconds.
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    pub sse_interval_ms: u64,

    /// Maximum number of simultaneous connections.
    #[arg(long, default_value_t = 1000)]
    pub max_connections: usize,

    /// Maximum accepted WebSocket payload, in bytes.
    #[arg(long, default_value_t = 64 * 1024)]
    pub max_frame_size: usize,

    /// Log connections idle for this many seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub idle_timeout_secs: Option<u64>,
}

impl Cli {
    /// Builds the server configuration from the parsed flags.
    #[must_use]
    pub fn to_config(&self) -> ServerConfig {
        ServerConfig {
            max_connections: self.max_connections,
            max_frame_size: self.max_frame_size,
            sse_interval: Duration::from_millis(self.sse_interval_ms),
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            ..ServerConfig::new(self.bind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["portmux"]).unwrap();
        let config = cli.to_config();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.sse_interval, Duration::from_millis(5000));
        assert_eq!(config.max_connections, 1000);
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "portmux",
            "--bind",
            "127.0.0.1:8080",
            "--sse-interval-ms",
            "250",
            "--max-connections",
            "5",
            "--idle-timeout-secs",
            "30",
        ])
        .unwrap();
        let config = cli.to_config();
        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.sse_interval, Duration::from_millis(250));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_periods_rejected() {
        assert!(Cli::try_parse_from(["portmux", "--sse-interval-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["portmux", "--idle-timeout-secs", "0"]).is_err());
    }

    #[test]
    fn test_bad_bind_rejected() {
        assert!(Cli::try_parse_from(["portmux", "--bind", "nope"]).is_err());
    }
}
