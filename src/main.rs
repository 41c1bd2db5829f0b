use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use orbwars_client::autopilot::{pick_card, Autopilot};
use orbwars_client::catalog::CardCatalog;
use orbwars_client::config::ClientConfig;
use orbwars_client::metrics::Metrics;
use orbwars_client::net::game_session::ClientSession;
use orbwars_client::net::transport::WsConnector;
use orbwars_client::util::clock::SystemClock;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Orb Wars client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: endpoint={}, tick_rate={}, autopilot={}",
        config.endpoint_url().unwrap_or_default(),
        config.tick_rate,
        config.autopilot
    );

    let catalog = match &config.card_catalog {
        Some(path) => CardCatalog::load(path).unwrap_or_else(|e| {
            warn!("{}, continuing without a card catalog", e);
            CardCatalog::default()
        }),
        None => CardCatalog::default(),
    };

    let metrics = Arc::new(Metrics::new());

    #[cfg(feature = "metrics_server")]
    {
        if let Some(port) = config.metrics_port {
            let metrics_clone = metrics.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    orbwars_client::metrics::start_metrics_server(metrics_clone, port).await
                {
                    error!("Metrics server error: {}", e);
                }
            });
        }
    }

    let mut session = ClientSession::new(
        &config,
        WsConnector,
        SystemClock::new(),
        catalog,
        metrics,
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let mut autopilot = config
        .autopilot
        .then(|| Autopilot::new(StdRng::from_entropy()));

    session
        .run(shutdown_rx, |session| {
            let Some(pilot) = autopilot.as_mut() else {
                return;
            };
            let Some(hud) = session.hud() else {
                return;
            };
            let input = pilot.steer(hud.leader.as_ref(), session.now_ms());
            session.set_input(input);

            let choice = session.card_offer().and_then(|offer| {
                let applied: &[String] = session
                    .sync()
                    .authoritative()
                    .map(|p| p.applied_cards.as_slice())
                    .unwrap_or(&[]);
                pick_card(offer, applied, session.catalog())
            });
            if let Some(card_id) = choice {
                session.choose_card(card_id);
            }
        })
        .await;

    let snapshot = session.metrics().to_prometheus();
    info!("Client stopped ({} metric lines)", snapshot.lines().count());
    Ok(())
}
