use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use lms_api::{ApiConfig, ApiState};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env()?;

    lms_api::tracing::init_tracing(&config.env);

    let pool = lms_db::create_pool(&config.database_url, config.db_max_connections).await?;
    lms_db::ensure_db_and_migrate(&config.database_url, &pool).await?;
    tracing::info!("Database migrations applied");

    let metrics_handle = lms_api::metrics::init_metrics()?;

    let port = config.port;
    let environment = config.env;
    let cors = lms_api::middleware::create_cors_layer(config.parsed_allowed_origins());

    let state = ApiState::new(config, pool)?;

    // Periodic maintenance; handles are dropped because the jobs live as long as the process
    let _job_handles =
        lms_api::jobs::start_background_jobs(state.pool.clone(), state.otp_expiry_minutes);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Scrape endpoint, kept out of the API state
    let metrics_app = Router::new()
        .route("/metrics", get(lms_api::metrics::metrics_handler))
        .with_state(metrics_handle);

    let app = lms_api::router::router()
        .with_state(state)
        .merge(metrics_app)
        .layer(cors)
        .layer(trace_layer)
        .layer(middleware::from_fn(lms_api::metrics::track_metrics))
        .layer(middleware::from_fn(
            lms_api::middleware::request_id_middleware,
        ));

    let app = lms_api::middleware::apply_security_headers(app, environment);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, ?environment, "Server listening");

    // Peer addresses feed the rate limiter when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
