//! Client session - owns every sync and render component and drives the tick loop

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::catalog::CardCatalog;
use crate::config::ClientConfig;
use crate::game::mailbox::{ReceivedSnapshot, SnapshotMailbox};
use crate::game::sync::{SnapshotOutcome, SyncPhase, SyncState};
use crate::hud::HudSnapshot;
use crate::metrics::Metrics;
use crate::net::connection::ConnectionState;
use crate::net::protocol::{CardDef, CardId, ClientMessage, GameStateData, InputState};
use crate::net::transport::{Connector, Inbound, LinkEvent, TransportChannel, TransportConfig};
use crate::render::effects::EffectLayerResolver;
use crate::render::registry::{EntityViewRegistry, FrameReport, LocalView};
use crate::util::clock::Clock;

/// Interval between summary log lines (ms)
const SUMMARY_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot derive a WebSocket endpoint from '{0}'")]
    Endpoint(String),
}

/// Held movement keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    W,
    A,
    S,
    D,
}

/// Session context shared by the tick loop and the message path
pub struct ClientSession<C: Connector, K: Clock> {
    clock: K,
    transport: TransportChannel<C>,
    sync: SyncState,
    views: EntityViewRegistry,
    resolver: EffectLayerResolver,
    catalog: CardCatalog,
    metrics: Arc<Metrics>,
    mailbox: SnapshotMailbox,
    /// Last applied snapshot; the registry renders from it every frame
    latest: Option<GameStateData>,
    card_offer: Option<Vec<CardDef>>,
    input: InputState,
    tick_interval: Duration,
    last_report: FrameReport,
    last_summary_ms: u64,
}

impl<C: Connector, K: Clock> ClientSession<C, K> {
    pub fn new(
        config: &ClientConfig,
        connector: C,
        clock: K,
        catalog: CardCatalog,
        metrics: Arc<Metrics>,
    ) -> Result<Self, SessionError> {
        let url = config
            .endpoint_url()
            .ok_or_else(|| SessionError::Endpoint(config.page_url.clone()))?;
        let transport = TransportChannel::new(
            TransportConfig {
                url,
                reconnect_delay_ms: config.reconnect_delay_ms,
            },
            connector,
            metrics.clone(),
        );
        let now = clock.now_ms();

        Ok(Self {
            clock,
            transport,
            sync: SyncState::new(),
            views: EntityViewRegistry::new(),
            resolver: EffectLayerResolver::new(),
            catalog,
            metrics,
            mailbox: SnapshotMailbox::new(),
            latest: None,
            card_offer: None,
            input: InputState::default(),
            // tokio intervals reject a zero period
            tick_interval: config.tick_interval().max(Duration::from_millis(1)),
            last_report: FrameReport::default(),
            last_summary_ms: now,
        })
    }

    /// Open the first connection
    pub fn start(&mut self) {
        let now = self.clock.now_ms();
        self.transport.connect(now);
    }

    /// Apply one link event from the transport
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        let now = self.clock.now_ms();
        if let Some(inbound) = self.transport.handle_event(event, now) {
            self.on_inbound(inbound, now);
        }
    }

    /// Drain queued link events without waiting
    pub fn pump(&mut self) {
        let now = self.clock.now_ms();
        for inbound in self.transport.pump(now) {
            self.on_inbound(inbound, now);
        }
    }

    fn on_inbound(&mut self, inbound: Inbound, now_ms: u64) {
        match inbound {
            Inbound::Identified(id) => self.sync.set_identity(id),
            Inbound::GameState(state) => {
                if self.mailbox.push(state, now_ms) {
                    Metrics::incr(&self.metrics.snapshots_superseded);
                }
            }
            Inbound::CardOffer(cards) => {
                info!(
                    "Card offer: {}",
                    cards
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.card_offer = Some(cards);
            }
            Inbound::Disconnected => self.reset_world(),
        }
    }

    /// Drop everything tied to the closed connection
    fn reset_world(&mut self) {
        let destroyed = self.views.clear();
        Metrics::add(&self.metrics.views_destroyed, destroyed.len() as u64);
        Metrics::set(&self.metrics.views_live, 0);
        Metrics::set(&self.metrics.pellets_live, 0);
        self.sync.reset();
        self.mailbox.clear();
        self.latest = None;
        self.card_offer = None;
        debug!("Cleared {} views after disconnect", destroyed.len());
    }

    /// Run one frame: reconcile, predict, send input, render
    pub fn tick(&mut self) -> &FrameReport {
        let started = Instant::now();
        let now = self.clock.now_ms();

        if let Some(snapshot) = self.mailbox.take() {
            self.apply_snapshot(snapshot);
        }

        self.sync.tick(&self.input);
        self.send_input(now);

        self.last_report = match self.latest.as_ref() {
            Some(state) => {
                let predicted = self.sync.predicted();
                let local = self
                    .sync
                    .local_id()
                    .filter(|_| self.sync.phase() == SyncPhase::Tracking)
                    .map(|id| LocalView {
                        id,
                        position: predicted.position,
                        size: predicted.size,
                    });
                self.views.render_frame(state, local, now, &mut self.resolver)
            }
            None => FrameReport::default(),
        };
        self.record_frame();

        self.transport.poll_reconnect(now);

        self.metrics.record_frame_time(started.elapsed());
        self.maybe_log_summary(now);
        &self.last_report
    }

    fn apply_snapshot(&mut self, snapshot: ReceivedSnapshot) {
        let ReceivedSnapshot {
            state,
            received_at_ms,
        } = snapshot;

        match self.sync.apply_snapshot(&state, received_at_ms) {
            SnapshotOutcome::Reconciled { error } => {
                Metrics::set(&self.metrics.prediction_error_x10, (error * 10.0).round() as u64);
            }
            SnapshotOutcome::DeadReckoned => Metrics::incr(&self.metrics.dead_reckonings),
            SnapshotOutcome::Initialized | SnapshotOutcome::Absent => {}
        }
        Metrics::incr(&self.metrics.snapshots_applied);
        self.latest = Some(state);
    }

    fn send_input(&mut self, now_ms: u64) {
        if !self.transport.is_connected() || !self.sync.should_send_input(now_ms) {
            return;
        }
        if self.transport.send(&ClientMessage::Input(self.input)) {
            self.sync.record_input_sent(now_ms);
            Metrics::incr(&self.metrics.inputs_sent);
        }
    }

    fn record_frame(&self) {
        let report = &self.last_report;
        Metrics::add(&self.metrics.views_created, report.created.len() as u64);
        Metrics::add(&self.metrics.views_destroyed, report.destroyed.len() as u64);
        Metrics::add(&self.metrics.body_redraws, report.body_redraws as u64);
        Metrics::add(&self.metrics.health_redraws, report.health_redraws as u64);
        Metrics::add(&self.metrics.overlay_refreshes, report.overlay_refreshes as u64);
        Metrics::set(&self.metrics.views_live, report.live as u64);
        Metrics::set(&self.metrics.pellets_live, report.pellets_live as u64);
        Metrics::set(&self.metrics.resolver_cache_hits, self.resolver.hits());
        Metrics::set(&self.metrics.resolver_cache_misses, self.resolver.misses());
    }

    fn maybe_log_summary(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.last_summary_ms) < SUMMARY_INTERVAL_MS {
            return;
        }
        self.last_summary_ms = now_ms;

        let predicted = self.sync.predicted();
        info!(
            "Client: {:?}, {} views + {} pellets, pos ({:.1}, {:.1}) speed {:.2} | frame {}us p95 {}us | resolver {:.0}% hit",
            self.transport.state(),
            self.views.len(),
            self.views.pellet_count(),
            predicted.position.x,
            predicted.position.y,
            predicted.current_speed,
            self.metrics.frame_time_us.load(Ordering::Relaxed),
            self.metrics.frame_time_p95_us.load(Ordering::Relaxed),
            self.metrics.resolver_hit_ratio().unwrap_or(0.0) * 100.0
        );
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        let mut input = self.input;
        match key {
            Key::W => input.w = pressed,
            Key::A => input.a = pressed,
            Key::S => input.s = pressed,
            Key::D => input.d = pressed,
        }
        self.set_input(input);
    }

    pub fn set_input(&mut self, input: InputState) {
        if input.any() != self.input.any() {
            debug!("Movement {}", if input.any() { "started" } else { "stopped" });
        }
        self.input = input;
    }

    /// Any movement key held
    pub fn is_moving(&self) -> bool {
        self.input.any()
    }

    pub fn input(&self) -> InputState {
        self.input
    }

    /// Answer the pending card offer
    ///
    /// Returns false when no offer contains `card_id` or the link is down;
    /// the offer stays pending in that case.
    pub fn choose_card(&mut self, card_id: CardId) -> bool {
        let offered = self
            .card_offer
            .as_ref()
            .is_some_and(|cards| cards.iter().any(|c| c.id == card_id));
        if !offered {
            warn!("Card {} is not part of the current offer", card_id);
            return false;
        }
        if !self.transport.send(&ClientMessage::CardChoice { card_id }) {
            return false;
        }

        let name = self.catalog.get(card_id).map(|c| c.name.as_str()).unwrap_or("?");
        info!("Chose card {} ({})", card_id, name);
        self.card_offer = None;
        true
    }

    pub fn card_offer(&self) -> Option<&[CardDef]> {
        self.card_offer.as_deref()
    }

    /// HUD values for the current frame, if a snapshot has been applied
    pub fn hud(&self) -> Option<HudSnapshot> {
        let state = self.latest.as_ref()?;
        Some(HudSnapshot::derive(
            state,
            self.sync.authoritative(),
            self.sync.predicted().position,
        ))
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn sync(&self) -> &SyncState {
        &self.sync
    }

    /// Mutable access for effects the wire does not carry (e.g. slow)
    pub fn sync_mut(&mut self) -> &mut SyncState {
        &mut self.sync
    }

    pub fn views(&self) -> &EntityViewRegistry {
        &self.views
    }

    pub fn catalog(&self) -> &CardCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn reconnect_at(&self) -> Option<u64> {
        self.transport.reconnect_at()
    }

    pub fn last_frame(&self) -> &FrameReport {
        &self.last_report
    }

    pub fn latest_state(&self) -> Option<&GameStateData> {
        self.latest.as_ref()
    }

    /// Close the link for good
    pub fn shutdown(&mut self) {
        self.transport.shutdown();
        self.reset_world();
    }

    /// Drive the session until `shutdown` flips to true
    ///
    /// `on_frame` runs after every tick, before the next event is awaited.
    pub async fn run<F>(&mut self, mut shutdown: watch::Receiver<bool>, mut on_frame: F)
    where
        F: FnMut(&mut Self),
    {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.start();
        info!("Client loop started, {:?} per tick", self.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                    on_frame(self);
                }
                event = self.transport.next_event() => match event {
                    Some(event) => self.handle_link_event(event),
                    // Sender half lives in the transport; unreachable while it exists
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.shutdown();
        info!("Client loop stopped");
    }
}
