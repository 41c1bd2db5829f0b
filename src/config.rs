use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::game::constants::net::{DEFAULT_PORT, DEV_WS_PORT, RECONNECT_DELAY_MS, WS_PATH};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL of the page the client was served from; the socket endpoint derives from it
    pub page_url: String,
    /// Explicit WebSocket URL, bypassing endpoint derivation
    pub ws_url: Option<String>,
    /// Port used when the page host is a local dev host
    pub dev_ws_port: u16,
    /// Delay before reconnecting after a close
    pub reconnect_delay_ms: u64,
    /// Simulation/render ticks per second
    pub tick_rate: u32,
    /// Card catalog JSON (optional)
    pub card_catalog: Option<PathBuf>,
    /// Serve Prometheus metrics on this port
    pub metrics_port: Option<u16>,
    /// Steer toward the leader instead of idling
    pub autopilot: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_url: format!("http://localhost:{}/", DEV_WS_PORT),
            ws_url: None,
            dev_ws_port: DEV_WS_PORT,
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            tick_rate: 60,
            card_catalog: Some(PathBuf::from("assets/cards.json")),
            metrics_port: None,
            autopilot: false,
        }
    }
}

impl ClientConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("PAGE_URL") {
            config.page_url = url;
        }

        if let Some(url) = lookup("WS_URL") {
            if url.starts_with("ws://") || url.starts_with("wss://") {
                config.ws_url = Some(url);
            } else {
                tracing::warn!("WS_URL must start with ws:// or wss://, ignoring '{}'", url);
            }
        }

        if let Some(port) = lookup("DEV_WS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.dev_ws_port = parsed,
                Ok(_) => tracing::warn!("DEV_WS_PORT must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid DEV_WS_PORT '{}', using default", port),
            }
        }

        if let Some(delay) = lookup("RECONNECT_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(parsed) if parsed > 0 => config.reconnect_delay_ms = parsed,
                Ok(_) => tracing::warn!("RECONNECT_DELAY_MS must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid RECONNECT_DELAY_MS '{}', using default", delay),
            }
        }

        if let Some(rate) = lookup("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (1..=240).contains(&parsed) => config.tick_rate = parsed,
                Ok(_) => tracing::warn!("TICK_RATE must be 1-240, using default"),
                Err(_) => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Some(path) = lookup("CARD_CATALOG") {
            config.card_catalog = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Some(port) = lookup("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.metrics_port = Some(parsed),
                Ok(_) => config.metrics_port = None,
                Err(_) => tracing::warn!("Invalid METRICS_PORT '{}', metrics disabled", port),
            }
        }

        if let Some(flag) = lookup("AUTOPILOT") {
            config.autopilot = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        config
    }

    /// WebSocket endpoint for this configuration
    pub fn endpoint_url(&self) -> Option<String> {
        match &self.ws_url {
            Some(url) => Some(url.clone()),
            None => resolve_endpoint(&self.page_url, self.dev_ws_port),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        if self.reconnect_delay_ms == 0 {
            return Err("reconnect_delay_ms must be at least 1".to_string());
        }
        if self.dev_ws_port == 0 {
            return Err("dev_ws_port cannot be 0".to_string());
        }
        if self.endpoint_url().is_none() {
            return Err(format!("Cannot derive a WebSocket endpoint from '{}'", self.page_url));
        }
        Ok(())
    }
}

/// Derive the game socket URL from the page URL
///
/// `wss` for https pages, `ws` otherwise. Local dev hosts always use
/// `dev_ws_port`; other hosts use the page port, or 443 when it has none
/// (a scheme-default port counts as none, as in a browser's `location.port`).
pub fn resolve_endpoint(page_url: &str, dev_ws_port: u16) -> Option<String> {
    let page = Url::parse(page_url).ok()?;
    let scheme = match page.scheme() {
        "https" => "wss",
        "http" => "ws",
        _ => return None,
    };

    // IPv6 literals come back bracketed
    let host = page.host_str().filter(|h| !h.is_empty())?;
    let port = if host == "localhost" || host == "127.0.0.1" {
        dev_ws_port
    } else {
        page.port().unwrap_or(DEFAULT_PORT)
    };

    Some(format!("{}://{}:{}{}", scheme, host, port, WS_PATH))
}
