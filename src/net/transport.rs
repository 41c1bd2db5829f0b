//! Duplex transport to the game server
//!
//! `TransportChannel` owns the connection lifecycle: connect, decode and
//! dispatch inbound envelopes, drop sends while disconnected, and arm a single
//! reconnect timer whenever the link closes. The socket itself sits behind
//! [`Connector`]; [`WsConnector`] is the tokio-tungstenite implementation.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::metrics::Metrics;
use crate::net::connection::{Connection, ConnectionState};
use crate::net::protocol::{
    decode, encode, CardDef, ClientMessage, DecodeError, EntityId, GameStateData, ServerMessage,
};

/// Event raised by a link, tagged with the generation of the attempt that opened it
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEvent {
    pub generation: u64,
    pub kind: LinkEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEventKind {
    Opened,
    Frame(String),
    Error(String),
    Closed,
}

/// Opens sockets on behalf of the transport
///
/// Implementations report everything that happens on the link through
/// `events` and return the sender used for outbound text frames. Dropping that
/// sender closes the link.
pub trait Connector {
    fn open(
        &mut self,
        url: &str,
        generation: u64,
        events: UnboundedSender<LinkEvent>,
    ) -> UnboundedSender<String>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(
        &mut self,
        url: &str,
        generation: u64,
        events: UnboundedSender<LinkEvent>,
    ) -> UnboundedSender<String> {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let url = url.to_string();

        tokio::spawn(async move {
            let emit = |kind| {
                // Receiver gone means the session is shutting down
                let _ = events.send(LinkEvent { generation, kind });
            };

            let stream = match connect_async(url.as_str()).await {
                Ok((stream, _response)) => stream,
                Err(e) => {
                    emit(LinkEventKind::Error(e.to_string()));
                    emit(LinkEventKind::Closed);
                    return;
                }
            };
            emit(LinkEventKind::Opened);

            let (mut write, mut read) = stream.split();
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => match outbound {
                        Some(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                emit(LinkEventKind::Error(e.to_string()));
                                break;
                            }
                        }
                        None => {
                            // Transport dropped this link
                            let _ = write.close().await;
                            break;
                        }
                    },
                    inbound = read.next() => match inbound {
                        Some(Ok(Message::Text(text))) => emit(LinkEventKind::Frame(text)),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            emit(LinkEventKind::Error(e.to_string()));
                            break;
                        }
                    },
                }
            }

            emit(LinkEventKind::Closed);
        });

        outbound_tx
    }
}

/// Decoded inbound traffic the session acts on
#[derive(Debug, Clone)]
pub enum Inbound {
    /// `welcome` assigned the local identity
    Identified(EntityId),
    GameState(GameStateData),
    CardOffer(Vec<CardDef>),
    /// Link closed; identity cleared, reconnect armed
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: String,
    pub reconnect_delay_ms: u64,
}

pub struct TransportChannel<C: Connector> {
    config: TransportConfig,
    connector: C,
    connection: Option<Connection>,
    outbound: Option<UnboundedSender<String>>,
    events_tx: UnboundedSender<LinkEvent>,
    events_rx: UnboundedReceiver<LinkEvent>,
    generation: u64,
    /// Deadline of the single pending reconnect, if any
    reconnect_at: Option<u64>,
    metrics: Arc<Metrics>,
}

impl<C: Connector> TransportChannel<C> {
    pub fn new(config: TransportConfig, connector: C, metrics: Arc<Metrics>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            connection: None,
            outbound: None,
            events_tx,
            events_rx,
            generation: 0,
            reconnect_at: None,
            metrics,
        }
    }

    /// Open a new link, superseding any previous one
    pub fn connect(&mut self, now_ms: u64) {
        self.generation += 1;
        self.reconnect_at = None;

        info!("Connecting to {} (attempt {})", self.config.url, self.generation);
        Metrics::incr(&self.metrics.connect_attempts);

        let outbound = self
            .connector
            .open(&self.config.url, self.generation, self.events_tx.clone());
        self.outbound = Some(outbound);
        self.connection = Some(Connection::new(
            self.generation,
            self.config.url.clone(),
            now_ms,
        ));
    }

    /// Send a message if connected; otherwise silently drop it
    ///
    /// Returns whether the message was handed to the link.
    pub fn send(&mut self, message: &ClientMessage) -> bool {
        let connected = self.connection.as_ref().is_some_and(|c| c.is_connected());
        let Some(outbound) = self.outbound.as_ref().filter(|_| connected) else {
            Metrics::incr(&self.metrics.sends_dropped);
            return false;
        };

        let text = match encode(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode outbound message: {}", e);
                return false;
            }
        };
        let len = text.len();

        if outbound.send(text).is_err() {
            // Link task already gone; its Closed event will follow
            Metrics::incr(&self.metrics.sends_dropped);
            return false;
        }

        if let Some(conn) = self.connection.as_mut() {
            conn.record_sent(len);
        }
        Metrics::incr(&self.metrics.messages_sent);
        Metrics::add(&self.metrics.bytes_sent, len as u64);
        true
    }

    /// Wait for the next link event
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        self.events_rx.recv().await
    }

    /// Non-blocking variant of [`next_event`](Self::next_event)
    pub fn try_next_event(&mut self) -> Option<LinkEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Apply one link event, returning what the session needs to act on
    pub fn handle_event(&mut self, event: LinkEvent, now_ms: u64) -> Option<Inbound> {
        if event.generation != self.generation || self.connection.is_none() {
            debug!(
                "Ignoring {:?} from stale link (generation {}, current {})",
                event.kind, event.generation, self.generation
            );
            return None;
        }

        match event.kind {
            LinkEventKind::Opened => {
                if let Some(conn) = self.connection.as_mut() {
                    conn.mark_open(now_ms);
                }
                Metrics::incr(&self.metrics.connections_opened);
                info!("Connected to server");
                None
            }
            LinkEventKind::Frame(text) => self.on_frame(&text, now_ms),
            LinkEventKind::Error(e) => {
                error!("Transport error: {}", e);
                None
            }
            LinkEventKind::Closed => self.on_close(now_ms),
        }
    }

    /// Drain every queued link event without waiting
    pub fn pump(&mut self, now_ms: u64) -> Vec<Inbound> {
        let mut inbound = Vec::new();
        while let Some(event) = self.try_next_event() {
            if let Some(msg) = self.handle_event(event, now_ms) {
                inbound.push(msg);
            }
        }
        inbound
    }

    /// Fire the pending reconnect if its deadline has passed
    pub fn poll_reconnect(&mut self, now_ms: u64) -> bool {
        match self.reconnect_at {
            Some(deadline) if now_ms >= deadline => {
                self.connect(now_ms);
                true
            }
            _ => false,
        }
    }

    /// Drop the link without scheduling a reconnect
    pub fn shutdown(&mut self) {
        self.outbound = None;
        self.connection = None;
        self.reconnect_at = None;
        info!("Transport shut down");
    }

    pub fn state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map(|c| c.state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn player_id(&self) -> Option<&str> {
        self.connection.as_ref()?.player_id.as_deref()
    }

    pub fn reconnect_at(&self) -> Option<u64> {
        self.reconnect_at
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    fn on_frame(&mut self, text: &str, now_ms: u64) -> Option<Inbound> {
        if let Some(conn) = self.connection.as_mut() {
            conn.record_received(text.len(), now_ms);
        }
        Metrics::incr(&self.metrics.messages_received);
        Metrics::add(&self.metrics.bytes_received, text.len() as u64);

        let message = match decode(text) {
            Ok(message) => message,
            Err(DecodeError::UnknownType(kind)) => {
                warn!("Unknown message type '{}', discarding", kind);
                Metrics::incr(&self.metrics.unknown_messages);
                return None;
            }
            Err(e) => {
                warn!("Failed to decode server message: {}", e);
                Metrics::incr(&self.metrics.decode_errors);
                return None;
            }
        };

        debug!("Received '{}' ({} bytes)", message.kind(), text.len());
        match message {
            ServerMessage::Welcome(welcome) => {
                let conn = self.connection.as_mut()?;
                if conn.identify(welcome.player_id.clone()) {
                    info!("Assigned player id {}", welcome.player_id);
                    Some(Inbound::Identified(welcome.player_id))
                } else {
                    warn!(
                        "Duplicate welcome ({}) on the same connection, keeping {:?}",
                        welcome.player_id, conn.player_id
                    );
                    None
                }
            }
            ServerMessage::GameState(state) => {
                Metrics::incr(&self.metrics.snapshots_received);
                Some(Inbound::GameState(state))
            }
            ServerMessage::CardOffer(offer) => {
                debug!("Received card offer with {} cards", offer.cards.len());
                Some(Inbound::CardOffer(offer.cards))
            }
        }
    }

    fn on_close(&mut self, now_ms: u64) -> Option<Inbound> {
        let conn = self.connection.as_mut()?;
        let was_closed = conn.state == ConnectionState::Disconnected;
        conn.mark_closed();
        self.outbound = None;

        self.schedule_reconnect(now_ms);

        if was_closed {
            None
        } else {
            info!("Disconnected from server");
            Some(Inbound::Disconnected)
        }
    }

    fn schedule_reconnect(&mut self, now_ms: u64) {
        if let Some(deadline) = self.reconnect_at {
            debug!("Reconnect already pending at {}ms", deadline);
            return;
        }
        let deadline = now_ms + self.config.reconnect_delay_ms;
        self.reconnect_at = Some(deadline);
        Metrics::incr(&self.metrics.reconnects_scheduled);
        info!("Reconnecting in {}ms", self.config.reconnect_delay_ms);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::LoopbackConnector;
    use super::*;
    use crate::net::protocol::InputState;
    use std::sync::atomic::Ordering;

    const URL: &str = "ws://localhost:6767/ws";

    fn transport() -> (TransportChannel<LoopbackConnector>, LoopbackConnector, Arc<Metrics>) {
        let connector = LoopbackConnector::default();
        let metrics = Arc::new(Metrics::new());
        let transport = TransportChannel::new(
            TransportConfig {
                url: URL.to_string(),
                reconnect_delay_ms: 3000,
            },
            connector.clone(),
            metrics.clone(),
        );
        (transport, connector, metrics)
    }

    fn connected() -> (TransportChannel<LoopbackConnector>, LoopbackConnector, Arc<Metrics>) {
        let (mut t, c, m) = transport();
        t.connect(0);
        c.emit(LinkEventKind::Opened);
        assert!(t.pump(0).is_empty());
        (t, c, m)
    }

    fn input() -> ClientMessage {
        ClientMessage::Input(InputState {
            w: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_connect_opens_link() {
        let (mut t, c, _) = transport();
        assert_eq!(t.state(), ConnectionState::Disconnected);
        t.connect(0);
        assert_eq!(t.state(), ConnectionState::Connecting);
        assert_eq!(c.open_count(), 1);
        assert_eq!(c.last_url().as_deref(), Some(URL));

        c.emit(LinkEventKind::Opened);
        t.pump(5);
        assert!(t.is_connected());
    }

    #[test]
    fn test_send_while_disconnected_is_noop() {
        let (mut t, c, m) = transport();
        assert!(!t.send(&input()));

        t.connect(0);
        // Still connecting
        assert!(!t.send(&input()));
        assert!(c.sent().is_empty());
        assert_eq!(m.sends_dropped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_send_while_connected() {
        let (mut t, c, m) = connected();
        assert!(t.send(&input()));
        assert!(t.send(&ClientMessage::CardChoice { card_id: 9 }));

        let frames = c.sent();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains(r#""type":"input""#));
        assert!(frames[1].contains(r#""card_id":9"#));
        assert_eq!(t.connection().unwrap().messages_sent, 2);
        assert_eq!(m.messages_sent.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_dispatch_by_type() {
        let (mut t, c, _) = connected();
        c.emit(LinkEventKind::Frame(
            r#"{"type":"welcome","data":{"player_id":"me"}}"#.to_string(),
        ));
        c.emit(LinkEventKind::Frame(
            r#"{"type":"game_state","data":{"players":[],"pellets":[]}}"#.to_string(),
        ));
        c.emit(LinkEventKind::Frame(
            r#"{"type":"card_offer","data":{"cards":[{"id":1,"name":"Fire I"}]}}"#.to_string(),
        ));

        let inbound = t.pump(10);
        assert_eq!(inbound.len(), 3);
        assert!(matches!(&inbound[0], Inbound::Identified(id) if id == "me"));
        assert!(matches!(&inbound[1], Inbound::GameState(_)));
        assert!(matches!(&inbound[2], Inbound::CardOffer(cards) if cards.len() == 1));
        assert_eq!(t.player_id(), Some("me"));
    }

    #[test]
    fn test_unknown_and_malformed_are_discarded() {
        let (mut t, c, m) = connected();
        c.emit(LinkEventKind::Frame(r#"{"type":"chat","data":{"msg":"hi"}}"#.to_string()));
        c.emit(LinkEventKind::Frame("{{{".to_string()));
        c.emit(LinkEventKind::Frame(
            r#"{"type":"welcome","data":{"player_id":"me"}}"#.to_string(),
        ));

        let inbound = t.pump(10);
        assert_eq!(inbound.len(), 1);
        assert!(t.is_connected());
        assert_eq!(m.unknown_messages.load(Ordering::Relaxed), 1);
        assert_eq!(m.decode_errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_duplicate_welcome_ignored() {
        let (mut t, c, _) = connected();
        c.emit(LinkEventKind::Frame(
            r#"{"type":"welcome","data":{"player_id":"first"}}"#.to_string(),
        ));
        c.emit(LinkEventKind::Frame(
            r#"{"type":"welcome","data":{"player_id":"second"}}"#.to_string(),
        ));
        let inbound = t.pump(0);
        assert_eq!(inbound.len(), 1);
        assert_eq!(t.player_id(), Some("first"));
    }

    #[test]
    fn test_close_clears_identity_and_schedules_reconnect() {
        let (mut t, c, _) = connected();
        c.emit(LinkEventKind::Frame(
            r#"{"type":"welcome","data":{"player_id":"me"}}"#.to_string(),
        ));
        t.pump(0);

        c.emit(LinkEventKind::Closed);
        let inbound = t.pump(1000);
        assert!(matches!(inbound.as_slice(), [Inbound::Disconnected]));
        assert_eq!(t.player_id(), None);
        assert_eq!(t.state(), ConnectionState::Disconnected);
        assert_eq!(t.reconnect_at(), Some(4000));
        assert!(!t.send(&input()));

        assert!(!t.poll_reconnect(3999));
        assert!(t.poll_reconnect(4000));
        assert_eq!(c.open_count(), 2);
        assert_eq!(t.reconnect_at(), None);
        assert_eq!(t.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_two_rapid_closes_arm_one_timer() {
        let (mut t, c, m) = connected();
        c.emit(LinkEventKind::Closed);
        c.emit(LinkEventKind::Closed);
        let inbound = t.pump(100);

        assert_eq!(inbound.len(), 1);
        assert_eq!(m.reconnects_scheduled.load(Ordering::Relaxed), 1);
        assert_eq!(t.reconnect_at(), Some(3100));

        assert!(t.poll_reconnect(3100));
        assert!(!t.poll_reconnect(3200));
        assert_eq!(c.open_count(), 2);
    }

    #[test]
    fn test_stale_link_events_ignored() {
        let (mut t, c, m) = connected();
        c.emit(LinkEventKind::Closed);
        t.pump(0);
        assert!(t.poll_reconnect(3000));

        // Late close from the first socket must not arm another timer
        c.emit_on(0, LinkEventKind::Closed);
        assert!(t.pump(3001).is_empty());
        assert_eq!(t.reconnect_at(), None);
        assert_eq!(m.reconnects_scheduled.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_failed_attempts_retry_indefinitely() {
        let (mut t, c, m) = transport();
        t.connect(0);
        let mut now = 0;
        for attempt in 1..=5 {
            c.emit(LinkEventKind::Error("connection refused".to_string()));
            c.emit(LinkEventKind::Closed);
            t.pump(now);
            now += 3000;
            assert!(t.poll_reconnect(now));
            assert_eq!(c.open_count(), attempt + 1);
        }
        assert_eq!(m.connect_attempts.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_error_alone_does_not_reconnect() {
        let (mut t, c, _) = connected();
        c.emit(LinkEventKind::Error("boom".to_string()));
        t.pump(0);
        assert!(t.is_connected());
        assert_eq!(t.reconnect_at(), None);
    }

    #[test]
    fn test_shutdown_cancels_reconnect() {
        let (mut t, c, _) = connected();
        c.emit(LinkEventKind::Closed);
        t.pump(0);
        t.shutdown();
        assert!(!t.poll_reconnect(10_000));
        assert_eq!(c.open_count(), 1);
    }

    #[tokio::test]
    async fn test_next_event_async() {
        let (mut t, c, _) = transport();
        t.connect(0);
        c.emit(LinkEventKind::Opened);
        let event = t.next_event().await.unwrap();
        assert_eq!(event.kind, LinkEventKind::Opened);
        assert_eq!(event.generation, 1);
    }

    #[test]
    fn test_next_event_pending_until_emit() {
        let (mut t, c, _) = transport();
        t.connect(0);

        let mut next = tokio_test::task::spawn(t.next_event());
        tokio_test::assert_pending!(next.poll());

        c.emit(LinkEventKind::Frame("{}".to_string()));
        assert!(next.is_woken());
        let event = tokio_test::assert_ready!(next.poll()).unwrap();
        assert_eq!(event.kind, LinkEventKind::Frame("{}".to_string()));
    }
}
