use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use domain::services::{
    sync, ApplicationLifecycle, CleanupConfig, CleanupEngine, Dashboard, LifecycleConfig,
    Notifier, RosterService, SyncHandle,
};
use domain::store::{ApplicationStore, ChangeFeed, MemberStore, ObjectStore};
use shared::jwt::JwtError;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_admin,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{admin_applications, applications, auth, health, roster};
use crate::services::{AdminAccounts, AuthService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lifecycle: Arc<ApplicationLifecycle>,
    pub dashboard: Arc<Dashboard>,
    pub sync: Arc<SyncHandle>,
    pub roster: Arc<RosterService>,
    pub auth: Arc<AuthService>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    /// Absent when running against in-memory stores.
    pub pool: Option<PgPool>,
}

/// External systems the services are wired to.
pub struct Collaborators {
    pub applications: Arc<dyn ApplicationStore>,
    pub members: Arc<dyn MemberStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub notifier: Arc<dyn Notifier>,
    pub feed: Arc<dyn ChangeFeed>,
    pub admins: Arc<dyn AdminAccounts>,
    pub pool: Option<PgPool>,
}

/// Builds the services and starts the sync layer.
pub async fn build_state(config: Config, collaborators: Collaborators) -> Result<AppState, JwtError> {
    let config = Arc::new(config);
    let jwt = config.jwt.build()?;

    let lifecycle = ApplicationLifecycle::new(
        collaborators.applications.clone(),
        collaborators.objects.clone(),
        collaborators.notifier,
        LifecycleConfig {
            invite_link: config.clan.invite_link.clone(),
            require_screenshots: config.clan.require_screenshots,
        },
    );

    let sync = sync::start(
        collaborators.applications.clone(),
        collaborators.feed,
        (&config.sync).into(),
    )
    .await;

    let cleanup = Arc::new(CleanupEngine::new(
        collaborators.applications,
        collaborators.objects,
        CleanupConfig {
            window: config.expiry_window(),
            retry_after: Duration::from_secs(config.expiry.retry_delay_secs),
        },
    ));
    let dashboard = Dashboard::new(sync.mirror(), cleanup);

    Ok(AppState {
        lifecycle: Arc::new(lifecycle),
        dashboard: Arc::new(dashboard),
        sync: Arc::new(sync),
        roster: Arc::new(RosterService::new(collaborators.members)),
        auth: Arc::new(AuthService::new(collaborators.admins, jwt)),
        rate_limiter: RateLimiterState::new(config.security.submissions_per_minute).map(Arc::new),
        pool: collaborators.pool,
        config,
    })
}

pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Submissions are rate limited per client and carry the screenshot uploads
    let submission_routes = Router::new()
        .route("/api/v1/applications", post(applications::submit_application))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(config.server.max_body_size));

    // Admin routes (require a live admin session)
    let admin_routes = Router::new()
        .route("/api/v1/auth/session", get(auth::session))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route(
            "/api/v1/admin/applications",
            get(admin_applications::list_applications),
        )
        .route(
            "/api/v1/admin/applications/refresh",
            post(admin_applications::refresh_applications),
        )
        .route(
            "/api/v1/admin/applications/events",
            get(admin_applications::application_events),
        )
        .route(
            "/api/v1/admin/applications/:id",
            get(admin_applications::get_application),
        )
        .route(
            "/api/v1/admin/applications/:id/decision",
            post(admin_applications::decide_application),
        )
        .route("/api/v1/admin/roster", put(roster::upsert_member))
        .route("/api/v1/admin/roster/:id", delete(roster::delete_member))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    // Public routes (no authentication required)
    let mut public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/roster", get(roster::get_roster))
        .route("/api/v1/auth/login", post(auth::login));

    // Locally stored screenshots are served by the app itself
    if config.storage.provider == "local" {
        public_routes =
            public_routes.nest_service("/files", ServeDir::new(&config.storage.local_root));
    }

    Router::new()
        .merge(public_routes)
        .merge(submission_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware)) // Prometheus metrics
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id)) // Request ID and logging
        .layer(cors)
        .with_state(state)
}
