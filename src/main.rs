use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use carebook::config::AppConfig;
use carebook::db;
use carebook::handlers;
use carebook::services::appointments;
use carebook::services::deadline::SystemClock;
use carebook::services::notify::webhook::WebhookNotifier;
use carebook::services::notify::{LogNotifier, Notifier};
use carebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("sending expiry notifications to {url}");
            Box::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            tracing::info!("no NOTIFY_WEBHOOK_URL set, expiry notifications are logged only");
            Box::new(LogNotifier)
        }
    };

    let (deadline_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        clock: Arc::new(SystemClock),
        notifier,
        drafts: Mutex::new(HashMap::new()),
        monitors: Mutex::new(HashMap::new()),
        deadline_tx,
    });

    appointments::spawn_expiry_listener(state.clone());
    let rearmed = appointments::rearm_monitors(&state)?;
    tracing::info!(rearmed, "deadline monitors restored");

    let app = handlers::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.monitors.lock().unwrap().clear();
    tracing::info!("server stopped");

    Ok(())
}
