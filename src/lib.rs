//! Orb Wars client core
//!
//! Sync and adaptive rendering for the Orb Wars multiplayer client: a
//! reconnecting WebSocket transport, local prediction with server
//! reconciliation, a cached entity view registry and the card-driven effect
//! layer resolver.
//!
//! # Features
//!
//! - `metrics_server` - Serve Prometheus metrics over HTTP (enabled by default)

pub mod autopilot;
pub mod catalog;
pub mod config;
pub mod game;
pub mod hud;
pub mod metrics;
pub mod net;
pub mod render;
pub mod util;
