//! Stratus Notification Service
//!
//! User registration and session authentication plus an email-notification
//! endpoint that either sends immediately or stores the email for later
//! delivery by a periodic sweep.

use anyhow::Result;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use stratus_database::{initialize_databases, EmailRepository, SessionRepository, UserRepository};
use stratus_utils::{init_logging, AppConfig};

mod dispatch;
mod extractors;
mod handlers;
mod middleware;
mod routes;
mod scheduler;
mod smtp_client;
mod template_engine;

use dispatch::EmailDispatcher;
use smtp_client::SmtpClient;
use template_engine::TemplateEngine;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: EmailDispatcher<EmailRepository, SmtpClient>,
    pub users: UserRepository,
    pub sessions: SessionRepository,
    pub config: AppConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|_| {
        eprintln!("Failed to load configuration, using defaults");
        AppConfig::default()
    });

    // Initialize logging
    init_logging(&config.logging)?;
    info!("Starting Stratus Notification Service");

    // Initialize databases
    let db_config = stratus_database::DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        redis_url: config.database.redis_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: Duration::from_secs(config.database.connection_timeout_seconds),
    };
    let (postgres_pool, redis_pool) = initialize_databases(&db_config).await?;
    info!("Database connections established");

    // Wire up the dispatch engine
    let templates = Arc::new(TemplateEngine::new());
    let transport = SmtpClient::new(config.email.clone())?;
    let dispatcher = EmailDispatcher::new(
        EmailRepository::new(postgres_pool.clone()),
        transport,
        templates,
        &config.email,
    );

    // Start the sweep timer
    let sweep_interval = Duration::from_secs(config.scheduler.sweep_interval_seconds);
    let _sweep_task = scheduler::spawn_sweep_timer(dispatcher.clone(), sweep_interval);
    info!(
        interval_seconds = config.scheduler.sweep_interval_seconds,
        "scheduled email sweep started"
    );

    let state = AppState {
        dispatcher,
        users: UserRepository::new(postgres_pool.clone()),
        sessions: SessionRepository::new(redis_pool),
        config: config.clone(),
    };

    // Build application router
    let app = create_app(state, &config)?;

    // Start server
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    let listener = TcpListener::bind(&addr).await?;
    info!("Notification Service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_app(state: AppState, config: &AppConfig) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(config.server.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")])
        .allow_credentials(true);

    // Every API route sits behind the x-api-key gate; only the health
    // endpoint is open.
    let api_routes = routes::create_api_routes().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::api_key_middleware,
    ));

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}
