//! Client metrics in Prometheus text format
//!
//! Counters are plain atomics so the transport, registry and session can bump
//! them through a shared `Arc<Metrics>`. With the `metrics_server` feature an
//! HTTP endpoint serves them at `/metrics`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Frame-time samples kept for percentiles
const FRAME_HISTORY: usize = 1000;

/// Metrics registry for the client session
#[derive(Debug)]
pub struct Metrics {
    // Transport
    pub connect_attempts: AtomicU64,
    pub connections_opened: AtomicU64,
    pub reconnects_scheduled: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub sends_dropped: AtomicU64,
    pub unknown_messages: AtomicU64,
    pub decode_errors: AtomicU64,

    // Sync
    pub snapshots_received: AtomicU64,
    pub snapshots_applied: AtomicU64,
    pub snapshots_superseded: AtomicU64,
    pub dead_reckonings: AtomicU64,
    pub inputs_sent: AtomicU64,
    /// Last reconciliation divergence, world units x 10
    pub prediction_error_x10: AtomicU64,

    // Views
    pub views_live: AtomicU64,
    pub pellets_live: AtomicU64,
    pub views_created: AtomicU64,
    pub views_destroyed: AtomicU64,
    pub body_redraws: AtomicU64,
    pub health_redraws: AtomicU64,
    pub overlay_refreshes: AtomicU64,
    pub resolver_cache_hits: AtomicU64,
    pub resolver_cache_misses: AtomicU64,

    // Frame timing (microseconds)
    pub frame_count: AtomicU64,
    pub frame_time_us: AtomicU64,
    pub frame_time_p95_us: AtomicU64,
    pub frame_time_max_us: AtomicU64,

    start_time: Instant,
    frame_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connect_attempts: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            reconnects_scheduled: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            sends_dropped: AtomicU64::new(0),
            unknown_messages: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            snapshots_received: AtomicU64::new(0),
            snapshots_applied: AtomicU64::new(0),
            snapshots_superseded: AtomicU64::new(0),
            dead_reckonings: AtomicU64::new(0),
            inputs_sent: AtomicU64::new(0),
            prediction_error_x10: AtomicU64::new(0),
            views_live: AtomicU64::new(0),
            pellets_live: AtomicU64::new(0),
            views_created: AtomicU64::new(0),
            views_destroyed: AtomicU64::new(0),
            body_redraws: AtomicU64::new(0),
            health_redraws: AtomicU64::new(0),
            overlay_refreshes: AtomicU64::new(0),
            resolver_cache_hits: AtomicU64::new(0),
            resolver_cache_misses: AtomicU64::new(0),
            frame_count: AtomicU64::new(0),
            frame_time_us: AtomicU64::new(0),
            frame_time_p95_us: AtomicU64::new(0),
            frame_time_max_us: AtomicU64::new(0),
            start_time: Instant::now(),
            frame_history: RwLock::new(VecDeque::with_capacity(FRAME_HISTORY)),
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn set(gauge: &AtomicU64, value: u64) {
        gauge.store(value, Ordering::Relaxed);
    }

    /// Record a frame time and update percentiles
    pub fn record_frame_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.frame_time_us.store(us, Ordering::Relaxed);
        self.frame_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.frame_history.write();
        history.push_back(us);
        while history.len() > FRAME_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            self.frame_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.frame_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Fraction of resolver lookups served from cache
    pub fn resolver_hit_ratio(&self) -> Option<f64> {
        let hits = self.resolver_cache_hits.load(Ordering::Relaxed);
        let total = hits + self.resolver_cache_misses.load(Ordering::Relaxed);
        (total > 0).then(|| hits as f64 / total as f64)
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        // Transport
        metric!("orbwars_client_connect_attempts_total", "Connection attempts", "counter",
            load(&self.connect_attempts));
        metric!("orbwars_client_connections_opened_total", "Connections successfully opened", "counter",
            load(&self.connections_opened));
        metric!("orbwars_client_reconnects_scheduled_total", "Reconnect timers armed", "counter",
            load(&self.reconnects_scheduled));
        metric!("orbwars_client_messages_sent_total", "Total messages sent", "counter",
            load(&self.messages_sent));
        metric!("orbwars_client_messages_received_total", "Total messages received", "counter",
            load(&self.messages_received));
        metric!("orbwars_client_bytes_sent_total", "Total bytes sent", "counter",
            load(&self.bytes_sent));
        metric!("orbwars_client_bytes_received_total", "Total bytes received", "counter",
            load(&self.bytes_received));
        metric!("orbwars_client_sends_dropped_total", "Sends dropped while disconnected", "counter",
            load(&self.sends_dropped));
        metric!("orbwars_client_unknown_messages_total", "Envelopes with an unknown type", "counter",
            load(&self.unknown_messages));
        metric!("orbwars_client_decode_errors_total", "Malformed envelopes or payloads", "counter",
            load(&self.decode_errors));

        // Sync
        metric!("orbwars_client_snapshots_received_total", "Snapshots received", "counter",
            load(&self.snapshots_received));
        metric!("orbwars_client_snapshots_applied_total", "Snapshots applied", "counter",
            load(&self.snapshots_applied));
        metric!("orbwars_client_snapshots_superseded_total", "Snapshots replaced before being applied", "counter",
            load(&self.snapshots_superseded));
        metric!("orbwars_client_dead_reckonings_total", "Snapshots handled by dead reckoning", "counter",
            load(&self.dead_reckonings));
        metric!("orbwars_client_inputs_sent_total", "Input messages sent", "counter",
            load(&self.inputs_sent));
        metric!("orbwars_client_prediction_error", "Last reconciliation divergence in world units", "gauge",
            load(&self.prediction_error_x10) as f64 / 10.0);

        // Views
        metric!("orbwars_client_views_live", "Live entity views", "gauge",
            load(&self.views_live));
        metric!("orbwars_client_pellets_live", "Live pellet views", "gauge",
            load(&self.pellets_live));
        metric!("orbwars_client_views_created_total", "Entity views created", "counter",
            load(&self.views_created));
        metric!("orbwars_client_views_destroyed_total", "Entity views destroyed", "counter",
            load(&self.views_destroyed));
        metric!("orbwars_client_body_redraws_total", "Body redraws", "counter",
            load(&self.body_redraws));
        metric!("orbwars_client_health_redraws_total", "Health bar redraws", "counter",
            load(&self.health_redraws));
        metric!("orbwars_client_overlay_refreshes_total", "Overlay refreshes", "counter",
            load(&self.overlay_refreshes));
        metric!("orbwars_client_resolver_cache_hits_total", "Effect resolver cache hits", "counter",
            load(&self.resolver_cache_hits));
        metric!("orbwars_client_resolver_cache_misses_total", "Effect resolver cache misses", "counter",
            load(&self.resolver_cache_misses));

        // Frames
        metric!("orbwars_client_frame_count", "Total frames processed", "counter",
            load(&self.frame_count));
        metric!("orbwars_client_frame_time_microseconds", "Last frame time in microseconds", "gauge",
            load(&self.frame_time_us));
        metric!("orbwars_client_frame_time_p95_microseconds", "95th percentile frame time", "gauge",
            load(&self.frame_time_p95_us));
        metric!("orbwars_client_frame_time_max_microseconds", "Maximum frame time", "gauge",
            load(&self.frame_time_max_us));
        metric!("orbwars_client_uptime_seconds", "Client uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
#[cfg(feature = "metrics_server")]
pub async fn start_metrics_server(
    metrics: std::sync::Arc<Metrics>,
    port: u16,
) -> anyhow::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tracing::{debug, info};

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    let response = if request.starts_with("GET /metrics") {
                        let body = metrics.to_prometheus();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else if request.starts_with("GET /health") {
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK".to_string()
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.frame_count.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.views_live.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.resolver_hit_ratio(), None);
    }

    #[test]
    fn test_record_frame_time() {
        let metrics = Metrics::new();
        for i in 0..100 {
            metrics.record_frame_time(Duration::from_micros(100 + i * 10));
        }

        assert_eq!(metrics.frame_count.load(Ordering::Relaxed), 100);
        assert_eq!(metrics.frame_time_us.load(Ordering::Relaxed), 1090);
        assert!(metrics.frame_time_p95_us.load(Ordering::Relaxed) >= 1000);
        assert_eq!(metrics.frame_time_max_us.load(Ordering::Relaxed), 1090);
    }

    #[test]
    fn test_history_is_bounded() {
        let metrics = Metrics::new();
        for _ in 0..(FRAME_HISTORY + 50) {
            metrics.record_frame_time(Duration::from_micros(5));
        }
        assert_eq!(metrics.frame_history.read().len(), FRAME_HISTORY);
    }

    #[test]
    fn test_counter_helpers() {
        let metrics = Metrics::new();
        Metrics::incr(&metrics.views_created);
        Metrics::incr(&metrics.views_created);
        Metrics::add(&metrics.bytes_sent, 40);
        Metrics::set(&metrics.views_live, 7);
        Metrics::set(&metrics.views_live, 3);

        assert_eq!(metrics.views_created.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.bytes_sent.load(Ordering::Relaxed), 40);
        assert_eq!(metrics.views_live.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_resolver_hit_ratio() {
        let metrics = Metrics::new();
        Metrics::add(&metrics.resolver_cache_hits, 3);
        Metrics::incr(&metrics.resolver_cache_misses);
        assert_eq!(metrics.resolver_hit_ratio(), Some(0.75));
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        Metrics::set(&metrics.views_live, 12);
        Metrics::set(&metrics.prediction_error_x10, 25);

        let output = metrics.to_prometheus();

        assert!(output.contains("orbwars_client_views_live 12"));
        assert!(output.contains("orbwars_client_prediction_error 2.5"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE orbwars_client_frame_count counter"));
    }
}
