//! Cached drawables for the visible population
//!
//! One `ViewRecord` per remote entity, created on first sighting and destroyed
//! when the entity leaves the snapshot. Transforms update every frame; the body
//! is repainted only when its size or tag sequence changes, or when an animated
//! style has gone stale. Health bars and overlays run on their own gates.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::game::constants::render::{ANIMATED_REDRAW_MS, OVERLAY_FRAME_INTERVAL};
use crate::net::protocol::{EntityId, GameStateData, PelletSnapshot, PlayerSnapshot};
use crate::render::canvas::{Color, DrawList};
use crate::render::effects::{EffectLayerResolver, EffectLayerSet};
use crate::render::overlay::{paint_overlays, HealthBarGeometry};
use crate::util::vec2::Vec2;

const PELLET_COLOR: Color = 0x7777cc;
const PELLET_ALPHA: f64 = 0.5;

/// Cached drawable state for one entity
#[derive(Debug)]
pub struct ViewRecord {
    pub id: EntityId,
    pub position: Vec2,
    pub body: DrawList,
    pub health_bar: DrawList,
    pub overlay: DrawList,
    layers: Arc<EffectLayerSet>,
    /// Exact tag sequence the current layers were resolved from
    fingerprint: Arc<[String]>,
    last_size: Option<f64>,
    last_health: Option<(f64, f64)>,
    last_redraw_ms: u64,
    last_overlay_frame: Option<u64>,
}

/// Which parts of a record were recomputed this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ViewUpdate {
    body: bool,
    health: bool,
    overlay: bool,
}

impl ViewRecord {
    fn new(id: EntityId) -> Self {
        Self {
            id,
            position: Vec2::ZERO,
            body: DrawList::new(),
            health_bar: DrawList::new(),
            overlay: DrawList::new(),
            layers: Arc::new(EffectLayerSet::default()),
            fingerprint: Arc::from(Vec::new()),
            last_size: None,
            last_health: None,
            last_redraw_ms: 0,
            last_overlay_frame: None,
        }
    }

    pub fn layers(&self) -> &EffectLayerSet {
        &self.layers
    }

    pub fn last_redraw_ms(&self) -> u64 {
        self.last_redraw_ms
    }

    fn update(
        &mut self,
        player: &PlayerSnapshot,
        position: Vec2,
        size: f64,
        now_ms: u64,
        frame: u64,
        resolver: &mut EffectLayerResolver,
    ) -> ViewUpdate {
        let mut update = ViewUpdate::default();
        self.position = position;

        let tags_changed = *self.fingerprint != *player.applied_cards.as_slice();
        if tags_changed {
            self.layers = resolver.resolve(&player.applied_cards);
            self.fingerprint = Arc::from(player.applied_cards.as_slice());
        }

        let size_changed = self.last_size != Some(size);
        let stale = self.layers.is_animated()
            && now_ms.saturating_sub(self.last_redraw_ms) > ANIMATED_REDRAW_MS;

        if size_changed || tags_changed || stale {
            self.body.clear();
            self.layers.paint(&mut self.body, size, now_ms as f64);
            self.last_size = Some(size);
            self.last_redraw_ms = now_ms;
            update.body = true;
        }

        let health = (player.health, player.max_health);
        if self.last_health != Some(health) {
            self.health_bar.clear();
            if let Some(bar) = HealthBarGeometry::layout(size, health.0, health.1) {
                bar.paint(&mut self.health_bar);
            }
            self.last_health = Some(health);
            update.health = true;
        }

        let overlay_due = self
            .last_overlay_frame
            .map_or(true, |last| frame.saturating_sub(last) >= OVERLAY_FRAME_INTERVAL);
        if overlay_due {
            self.overlay.clear();
            paint_overlays(&mut self.overlay, player, size, now_ms as f64);
            self.last_overlay_frame = Some(frame);
            update.overlay = true;
        }

        update
    }
}

/// Static drawable for a pellet
#[derive(Debug)]
pub struct PelletView {
    pub id: EntityId,
    pub position: Vec2,
    pub body: DrawList,
}

impl PelletView {
    fn new(pellet: &PelletSnapshot) -> Self {
        let mut body = DrawList::new();
        body.fill_circle(Vec2::ZERO, pellet.size, PELLET_COLOR, PELLET_ALPHA);
        Self {
            id: pellet.id.clone(),
            position: pellet.position(),
            body,
        }
    }
}

/// The locally controlled entity, drawn at its predicted position
#[derive(Debug, Clone, Copy)]
pub struct LocalView<'a> {
    pub id: &'a str,
    pub position: Vec2,
    pub size: f64,
}

/// What changed during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub created: Vec<EntityId>,
    pub destroyed: Vec<EntityId>,
    pub body_redraws: usize,
    pub health_redraws: usize,
    pub overlay_refreshes: usize,
    pub pellets_created: usize,
    pub pellets_destroyed: usize,
    pub live: usize,
    pub pellets_live: usize,
}

impl FrameReport {
    fn record(&mut self, update: ViewUpdate) {
        self.body_redraws += update.body as usize;
        self.health_redraws += update.health as usize;
        self.overlay_refreshes += update.overlay as usize;
    }
}

#[derive(Debug, Default)]
pub struct EntityViewRegistry {
    views: HashMap<EntityId, ViewRecord>,
    pellets: HashMap<EntityId, PelletView>,
    local: Option<ViewRecord>,
    frame: u64,
}

impl EntityViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring every view in line with `state`
    ///
    /// Afterwards the live records are exactly the snapshot's players minus
    /// the local one.
    pub fn render_frame(
        &mut self,
        state: &GameStateData,
        local: Option<LocalView<'_>>,
        now_ms: u64,
        resolver: &mut EffectLayerResolver,
    ) -> FrameReport {
        self.frame += 1;
        let frame = self.frame;
        let mut report = FrameReport {
            frame,
            ..Default::default()
        };
        let local_id = local.map(|l| l.id);

        let present: HashSet<&str> = state
            .players
            .iter()
            .map(|p| p.id.as_str())
            .filter(|id| Some(*id) != local_id)
            .collect();

        self.views.retain(|id, _| {
            let keep = present.contains(id.as_str());
            if !keep {
                report.destroyed.push(id.clone());
            }
            keep
        });

        for player in &state.players {
            if Some(player.id.as_str()) == local_id {
                continue;
            }
            let record = self.views.entry_ref(player.id.as_str()).or_insert_with(|| {
                report.created.push(player.id.clone());
                ViewRecord::new(player.id.clone())
            });
            let update = record.update(player, player.position(), player.size, now_ms, frame, resolver);
            report.record(update);
        }

        self.render_local(state, local, now_ms, frame, resolver, &mut report);
        self.render_pellets(&state.pellets, &mut report);

        report.live = self.views.len();
        report.pellets_live = self.pellets.len();

        if !report.created.is_empty() || !report.destroyed.is_empty() {
            debug!(
                "Frame {}: +{} -{} views ({} live)",
                frame,
                report.created.len(),
                report.destroyed.len(),
                report.live
            );
        }
        report
    }

    fn render_local(
        &mut self,
        state: &GameStateData,
        local: Option<LocalView<'_>>,
        now_ms: u64,
        frame: u64,
        resolver: &mut EffectLayerResolver,
        report: &mut FrameReport,
    ) {
        let Some((view, player)) = local.and_then(|view| Some((view, state.player(view.id)?))) else {
            self.local = None;
            return;
        };

        if self.local.as_ref().map(|r| r.id.as_str()) != Some(view.id) {
            self.local = Some(ViewRecord::new(view.id.to_string()));
        }
        if let Some(record) = self.local.as_mut() {
            let update = record.update(player, view.position, view.size, now_ms, frame, resolver);
            report.record(update);
        }
    }

    fn render_pellets(&mut self, pellets: &[PelletSnapshot], report: &mut FrameReport) {
        let present: HashSet<&str> = pellets.iter().map(|p| p.id.as_str()).collect();

        let before = self.pellets.len();
        self.pellets.retain(|id, _| present.contains(id.as_str()));
        report.pellets_destroyed = before - self.pellets.len();

        for pellet in pellets {
            match self.pellets.get_mut(pellet.id.as_str()) {
                Some(view) => view.position = pellet.position(),
                None => {
                    self.pellets.insert(pellet.id.clone(), PelletView::new(pellet));
                    report.pellets_created += 1;
                }
            }
        }
    }

    /// Drop every view, returning the ids of destroyed entity records
    pub fn clear(&mut self) -> Vec<EntityId> {
        self.pellets.clear();
        self.local = None;
        self.views.drain().map(|(id, _)| id).collect()
    }

    pub fn get(&self, id: &str) -> Option<&ViewRecord> {
        self.views.get(id)
    }

    pub fn local(&self) -> Option<&ViewRecord> {
        self.local.as_ref()
    }

    pub fn pellet(&self, id: &str) -> Option<&PelletView> {
        self.pellets.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn pellet_count(&self) -> usize {
        self.pellets.len()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}
