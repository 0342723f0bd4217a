//! Meteor - An age-segmented reading platform

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meteor::{
    api::{self, AppState},
    config::Config,
    db,
    services::EmailService,
};

/// How often expired sessions and reset tokens are swept
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meteor=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Meteor...");

    // Load configuration
    let config = Config::load_with_env(&Config::default_path())?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let mailer = Arc::new(EmailService::new(config.mail.clone()));
    if !config.mail.is_enabled() {
        tracing::warn!("SMTP not configured, password reset mails will not be sent");
    }

    let state = AppState::new(pool, &config, mailer);
    state.storage.init().await?;
    tracing::info!("Storage ready at {}", config.storage.path.display());

    // Sweep expired sessions and reset tokens
    {
        let users = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                match users.cleanup_expired().await {
                    Ok((sessions, resets)) if sessions + resets > 0 => {
                        tracing::info!("Removed {} expired sessions and {} reset tokens", sessions, resets);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Cleanup of expired credentials failed: {}", e),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
