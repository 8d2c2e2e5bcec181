//! Connection bookkeeping.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Identity of one accepted TCP stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol state of a connection.
///
/// A connection leaves `Unclassified` once. `WebSocketOpen` and
/// `SseSubscribed` are terminal until the socket closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No input classified yet.
    #[default]
    Unclassified,
    /// Served a plain HTTP request.
    Http,
    /// Sent a handshake request; no 101 written yet.
    WebSocketHandshaking,
    /// Handshake complete; input is decoded as frames.
    WebSocketOpen,
    /// Registered with the SSE broadcaster.
    SseSubscribed,
}

/// Connection information.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection ID.
    pub id: ConnectionId,
    /// Peer address.
    pub peer_addr: SocketAddr,
    /// Current protocol state.
    pub state: ConnectionState,
    /// Accept time.
    pub created_at: DateTime<Utc>,
    /// Time of the last inbound item.
    pub last_activity: DateTime<Utc>,
}

struct Entry {
    info: ConnectionInfo,
    close: CancellationToken,
}

/// Tracks live connections and their close signals.
///
/// Every connection's close token is a child of the table's root token, so
/// [`ConnectionTable::shutdown`] closes them all.
pub struct ConnectionTable {
    entries: RwLock<HashMap<ConnectionId, Entry>>,
    next_id: AtomicU64,
    root: CancellationToken,
}

impl ConnectionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            root: CancellationToken::new(),
        }
    }

    /// Registers a new connection.
    ///
    /// # Returns
    /// The connection ID and the token that fires when the connection must
    /// close.
    pub fn open(&self, peer_addr: SocketAddr) -> (ConnectionId, CancellationToken) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = Utc::now();
        let close = self.root.child_token();

        let info = ConnectionInfo {
            id,
            peer_addr,
            state: ConnectionState::Unclassified,
            created_at: now,
            last_activity: now,
        };

        self.entries.write().insert(
            id,
            Entry {
                info,
                close: close.clone(),
            },
        );
        (id, close)
    }

    /// Removes a connection after its task finished.
    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.entries.write().remove(&id).map(|entry| entry.info)
    }

    /// Signals a connection to close. Returns false if it is unknown.
    pub fn close(&self, id: ConnectionId) -> bool {
        match self.entries.read().get(&id) {
            Some(entry) => {
                entry.close.cancel();
                true
            }
            None => false,
        }
    }

    /// Signals every connection, current and future, to close.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    /// Returns a token cancelled by [`ConnectionTable::shutdown`].
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Records the connection's new protocol state.
    pub fn set_state(&self, id: ConnectionId, state: ConnectionState) {
        if let Some(entry) = self.entries.write().get_mut(&id) {
            entry.info.state = state;
        }
    }

    /// Updates the last activity timestamp.
    pub fn touch(&self, id: ConnectionId) {
        if let Some(entry) = self.entries.write().get_mut(&id) {
            entry.info.last_activity = Utc::now();
        }
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns the number of live connections in `state`.
    #[must_use]
    pub fn count_in(&self, state: ConnectionState) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.info.state == state)
            .count()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:3000".parse().unwrap()
    }

    #[test]
    fn test_open_assigns_unique_ids() {
        let table = ConnectionTable::new();
        let (a, _) = table.open(addr());
        let (b, _) = table.open(addr());
        assert_ne!(a, b);
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_new_connection_is_unclassified() {
        let table = ConnectionTable::new();
        let (id, _) = table.open(addr());
        assert_eq!(table.count_in(ConnectionState::Unclassified), 1);

        let info = table.remove(id).unwrap();
        assert_eq!(info.id, id);
        assert_eq!(info.state, ConnectionState::Unclassified);
        assert_eq!(info.peer_addr, addr());
        assert!(info.last_activity >= info.created_at);
    }

    #[test]
    fn test_set_state_and_count_in() {
        let table = ConnectionTable::new();
        let (a, _) = table.open(addr());
        let (_b, _) = table.open(addr());
        table.set_state(a, ConnectionState::SseSubscribed);
        assert_eq!(table.count_in(ConnectionState::SseSubscribed), 1);
        assert_eq!(table.count_in(ConnectionState::Unclassified), 1);
    }

    #[test]
    fn test_remove() {
        let table = ConnectionTable::new();
        let (id, _) = table.open(addr());
        assert!(table.remove(id).is_some());
        assert!(table.remove(id).is_none());
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn test_close_cancels_only_target() {
        let table = ConnectionTable::new();
        let (a, token_a) = table.open(addr());
        let (_b, token_b) = table.open(addr());
        assert!(table.close(a));
        assert!(token_a.is_cancelled());
        assert!(!token_b.is_cancelled());
        assert!(!table.close(ConnectionId(999)));
    }

    #[test]
    fn test_shutdown_cancels_all() {
        let table = ConnectionTable::new();
        let (_a, token_a) = table.open(addr());
        let watcher = table.shutdown_token();
        table.shutdown();
        assert!(token_a.is_cancelled());
        assert!(watcher.is_cancelled());
    }
}
