mod auth;
mod clients;
mod config;
mod handlers;
mod ledger;
mod models;
mod rate_limit;
mod schedule;
mod store;

use anyhow::Context;
use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use clients::ClientRegistry;
use config::Config;
use ledger::BookingLedger;
use rate_limit::{rate_limit, RateLimitConfig, RateLimiter, Tier};

/// Shared application state accessible from all handlers.
///
/// Lock order is ledger, then clients. A booking holds the ledger lock from
/// the conflict check until the file is rewritten.
pub struct AppState {
    pub config: Config,
    pub ledger: Mutex<BookingLedger>,
    pub clients: Mutex<ClientRegistry>,
    pub started_at: Instant,
}

impl AppState {
    /// Load both tables, creating missing files.
    pub async fn load(config: Config) -> anyhow::Result<Self> {
        let ledger = BookingLedger::load_or_create(config.bookings_path.clone())
            .await
            .with_context(|| format!("loading {}", config.bookings_path.display()))?;
        let clients = ClientRegistry::load_or_create(config.clients_path.clone())
            .await
            .with_context(|| format!("loading {}", config.clients_path.display()))?;

        Ok(Self {
            config,
            ledger: Mutex::new(ledger),
            clients: Mutex::new(clients),
            started_at: Instant::now(),
        })
    }
}

/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

fn rate_limits() -> [(Tier, RateLimitConfig); 3] {
    [
        (
            Tier::Public,
            RateLimitConfig {
                max_requests: 60,
                window: Duration::from_secs(60),
            },
        ),
        (
            Tier::Booking,
            RateLimitConfig {
                max_requests: 10,
                window: Duration::from_secs(300),
            },
        ),
        (
            Tier::Admin,
            RateLimitConfig {
                max_requests: 120,
                window: Duration::from_secs(60),
            },
        ),
    ]
}

/// Only `WEBAPP_URL` when configured, otherwise any origin.
fn build_cors(webapp_url: Option<&str>) -> anyhow::Result<CorsLayer> {
    let origin = match webapp_url {
        Some(url) => AllowOrigin::exact(
            url.parse::<HeaderValue>()
                .context("WEBAPP_URL must be a valid origin")?,
        ),
        None => AllowOrigin::any(),
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

fn build_router(state: Arc<AppState>, limiter: RateLimiter, cors: CorsLayer) -> Router {
    // 1. No limit: health checks
    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    // 2. Public: read-only booking form data
    let public_routes = Router::new()
        .route("/api/barbers", get(handlers::client::list_barbers))
        .route("/api/schedule", get(handlers::client::schedule))
        .route("/api/available-times", get(handlers::client::available_times))
        .route("/api/calendar", get(handlers::client::calendar))
        .route("/api/clients/{phone}", get(handlers::client::lookup_client))
        .layer(from_fn_with_state((limiter.clone(), Tier::Public), rate_limit));

    // 3. Booking creation: strictest limit
    let booking_routes = Router::new()
        .route("/api/bookings", post(handlers::client::create_booking))
        .layer(from_fn_with_state((limiter.clone(), Tier::Booking), rate_limit));

    // 4. Admin: password-gated
    let admin_routes = Router::new()
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/admin/bookings/export",
            get(handlers::admin::export_bookings),
        )
        .route("/api/admin/clients", get(handlers::admin::list_clients))
        .layer(from_fn_with_state((limiter, Tier::Admin), rate_limit));

    Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);
    let cors = build_cors(config.webapp_url.as_deref())?;

    let state = Arc::new(AppState::load(config).await?);
    {
        let ledger = state.ledger.lock().await;
        let clients = state.clients.lock().await;
        tracing::info!(
            "Loaded {} bookings and {} clients; barbers: {}",
            ledger.len(),
            clients.len(),
            state.config.barbers.join(", ")
        );
        if ledger.is_empty() && clients.is_empty() {
            tracing::info!("Starting with no bookings and no clients on file");
        }
    }

    // ── Rate limiter + background cleanup of stale entries ──
    let rate_limiter = RateLimiter::new(rate_limits());
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let app = build_router(state, rate_limiter, cors);

    tracing::info!("Barbearia server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
