use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use botapi_client::BotApiClient;
use courier_common::Config;
use courier_engine::{Broadcaster, RegistrationFlow};
use courier_store::{ParticipantStore, SessionStore};

mod dispatch;
mod panels;
mod render;
mod sender;
mod update;

use dispatch::AppState;
use sender::ChannelSender;
use update::Update;

async fn webhook(State(state): State<Arc<AppState>>, Json(update): Json<Update>) -> &'static str {
    if let Err(e) = dispatch::handle_update(&state, update).await {
        error!(error = %e, "Failed to handle update");
    }
    "ok"
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("courier=info".parse()?))
        .init();

    info!("Courier gateway starting...");

    // Load config
    let config = Config::from_env();
    info!(
        operators = config.operator_ids.len(),
        host = config.host.as_str(),
        port = config.port,
        "Configuration loaded"
    );

    // Connect to Postgres and run migrations
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    courier_store::migrate(&pool).await?;

    let participants = ParticipantStore::new(pool.clone());
    let sessions = SessionStore::new(pool);

    // Channel transport
    let bot = Arc::new(BotApiClient::new(&config.api_base_url, &config.bot_token));
    let channel = Arc::new(ChannelSender::new(bot.clone()));

    // The two state machines
    let registration = RegistrationFlow::new(
        participants.clone(),
        sessions.clone(),
        channel.clone(),
        config.operator_ids.clone(),
    );
    let broadcaster = Broadcaster::new(
        participants.clone(),
        channel.clone(),
        channel.clone(),
        config.operator_ids.clone(),
    );

    // Register the webhook with the channel, if we know our public address
    if let Some(public_url) = &config.public_url {
        let webhook_url = format!("{}/webhook", public_url.trim_end_matches('/'));
        bot.set_webhook(&webhook_url).await?;
        info!(url = webhook_url.as_str(), "Webhook registered");
    }

    let state = Arc::new(AppState {
        bot,
        participants,
        sessions,
        registration,
        broadcaster,
        config: config.clone(),
        identity_locks: Default::default(),
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Channel updates land here
        .route("/webhook", post(webhook))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!(addr = addr.as_str(), "Listening for updates");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
