use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use clan_recruit_api::app::{build_state, create_router, Collaborators};
use clan_recruit_api::config::Config;
use clan_recruit_api::jobs::{ImageExpiryJob, JobScheduler, PoolMetricsJob};
use clan_recruit_api::middleware::{init_metrics, logging::init_logging};
use clan_recruit_api::services::{
    admin_bootstrap::bootstrap_admin, build_object_store, AuthService, EmailService,
};
use persistence::repositories::{AdminRepository, ApplicationRepository, MemberRepository};
use persistence::PgChangeFeed;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging and metrics
    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting Clan Recruit API v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config).await?;

    // Run migrations
    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    // Collaborators
    let admins = Arc::new(AdminRepository::new(pool.clone()));
    let objects = build_object_store(&config.storage)
        .await
        .context("Failed to prepare screenshot storage")?;
    let email = EmailService::new(config.email.clone(), config.clan.name.clone());
    if !email.is_enabled() {
        info!("Email notifications disabled");
    }

    // Bootstrap admin before serving
    let bootstrap_auth = AuthService::new(admins.clone(), config.jwt.build()?);
    bootstrap_admin(&bootstrap_auth, &config.admin).await?;

    let collaborators = Collaborators {
        applications: Arc::new(ApplicationRepository::new(pool.clone())),
        members: Arc::new(MemberRepository::new(pool.clone())),
        objects,
        notifier: Arc::new(email),
        feed: Arc::new(PgChangeFeed::new(pool.clone())),
        admins,
        pool: Some(pool.clone()),
    };
    let addr: SocketAddr = config.socket_addr()?;
    let expiry_interval = config.expiry.job_interval_secs;

    // Build services and start the sync layer
    let state = build_state(config, collaborators).await?;
    info!(mode = ?state.sync.mode(), "Application sync started");

    // Background jobs
    let mut scheduler = JobScheduler::new();
    scheduler.register(ImageExpiryJob::new(state.dashboard.clone(), expiry_interval));
    scheduler.register(PoolMetricsJob::new(pool));
    scheduler.start();

    let app = create_router(state.clone());

    // Start server
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped, shutting down background work");
    scheduler.shutdown();
    scheduler.wait_for_shutdown(SHUTDOWN_GRACE).await;
    state.sync.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
