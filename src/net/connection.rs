use crate::net::protocol::EntityId;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link; a reconnect may be pending
    Disconnected,
    /// Link requested, waiting for the socket to open
    Connecting,
    /// Socket open, sends are delivered
    Connected,
}

/// Per-link bookkeeping
///
/// A fresh record is created for every connection attempt; the generation
/// number lets the transport ignore events from superseded sockets.
#[derive(Debug)]
pub struct Connection {
    pub generation: u64,
    pub url: String,
    pub state: ConnectionState,
    /// Identity assigned by `welcome` on this link
    pub player_id: Option<EntityId>,
    pub opened_at_ms: Option<u64>,
    pub last_activity_ms: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
}

impl Connection {
    pub fn new(generation: u64, url: String, now_ms: u64) -> Self {
        Self {
            generation,
            url,
            state: ConnectionState::Connecting,
            player_id: None,
            opened_at_ms: None,
            last_activity_ms: now_ms,
            bytes_sent: 0,
            bytes_received: 0,
            messages_sent: 0,
            messages_received: 0,
        }
    }

    /// Socket opened
    pub fn mark_open(&mut self, now_ms: u64) {
        self.state = ConnectionState::Connected;
        self.opened_at_ms = Some(now_ms);
        self.last_activity_ms = now_ms;
    }

    /// Socket gone; identity is only valid for the lifetime of a link
    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.player_id = None;
    }

    /// Assign the identity from `welcome`. Returns false if one was already set.
    pub fn identify(&mut self, player_id: EntityId) -> bool {
        if self.player_id.is_some() {
            return false;
        }
        self.player_id = Some(player_id);
        true
    }

    /// Record bytes sent
    pub fn record_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.messages_sent += 1;
    }

    /// Record bytes received
    pub fn record_received(&mut self, bytes: usize, now_ms: u64) {
        self.bytes_received += bytes as u64;
        self.messages_received += 1;
        self.last_activity_ms = now_ms;
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Time since the last inbound frame
    pub fn idle_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_activity_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        Connection::new(1, "ws://localhost:6767/ws".to_string(), 0)
    }

    #[test]
    fn test_connection_new() {
        let conn = test_conn();
        assert_eq!(conn.generation, 1);
        assert_eq!(conn.state, ConnectionState::Connecting);
        assert!(conn.player_id.is_none());
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_connection_lifecycle() {
        let mut conn = test_conn();
        conn.mark_open(10);
        assert!(conn.is_connected());
        assert_eq!(conn.opened_at_ms, Some(10));

        assert!(conn.identify("p1".to_string()));
        assert!(!conn.identify("p2".to_string()));
        assert_eq!(conn.player_id.as_deref(), Some("p1"));

        conn.mark_closed();
        assert_eq!(conn.state, ConnectionState::Disconnected);
        assert!(conn.player_id.is_none());
    }

    #[test]
    fn test_connection_stats() {
        let mut conn = test_conn();

        conn.record_sent(100);
        conn.record_sent(200);
        conn.record_received(50, 40);

        assert_eq!(conn.bytes_sent, 300);
        assert_eq!(conn.bytes_received, 50);
        assert_eq!(conn.messages_sent, 2);
        assert_eq!(conn.messages_received, 1);
        assert_eq!(conn.idle_ms(100), 60);
    }
}
