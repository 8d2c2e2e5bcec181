//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the multiplexing server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum number of live connections.
    pub max_connections: usize,
    /// Maximum accepted WebSocket payload in bytes.
    pub max_frame_size: usize,
    /// Maximum buffered request head in bytes.
    pub max_request_head: usize,
    /// Period of the SSE ticker.
    pub sse_interval: Duration,
    /// Idle time after which a connection logs an idle event.
    pub idle_timeout: Option<Duration>,
    /// Enable TCP_NODELAY on accepted sockets.
    pub tcp_nodelay: bool,
    /// Capacity of the command and event channels.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 1000,
            max_frame_size: 64 * 1024,
            max_request_head: 8 * 1024,
            sse_interval: Duration::from_millis(5000),
            idle_timeout: None,
            tcp_nodelay: true,
            channel_capacity: 64,
        }
    }
}

impl ServerConfig {
    /// Creates a config with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.max_frame_size, 64 * 1024);
        assert_eq!(config.sse_interval, Duration::from_millis(5000));
        assert!(config.idle_timeout.is_none());
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_new_keeps_defaults() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::new(addr);
        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_request_head, 8 * 1024);
    }
}
