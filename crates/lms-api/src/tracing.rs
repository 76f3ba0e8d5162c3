//! Logging setup.
//!
//! Development gets pretty, file/line annotated output at `debug`; production
//! gets one flattened JSON object per event at `info`. `RUST_LOG` overrides
//! either default, e.g. `RUST_LOG=lms_api=trace,sqlx=info`.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Environment;

const DEVELOPMENT_FILTER: &str = "debug,lms_api=debug,lms_db=debug,tower_http=debug,sqlx=warn";
const PRODUCTION_FILTER: &str = "info,tower_http=info,sqlx=warn";

pub fn init_tracing(env: &Environment) {
    if env.is_development() {
        init_development_tracing();
    } else {
        init_production_tracing();
    }
}

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_development_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .pretty()
                .with_filter(filter_or(DEVELOPMENT_FILTER)),
        )
        .init();

    tracing::info!("Tracing initialized in development mode");
}

fn init_production_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_target(true)
                .with_filter(filter_or(PRODUCTION_FILTER)),
        )
        .init();

    tracing::info!("Tracing initialized in production mode");
}
