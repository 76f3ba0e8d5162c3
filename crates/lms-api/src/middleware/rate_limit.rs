//! Per-IP rate limiting with `tower_governor`.
//!
//! Clients are keyed by `X-Forwarded-For` / `X-Real-IP` / `Forwarded` and
//! fall back to the peer address, so the server must be started with
//! `into_make_service_with_connect_info::<SocketAddr>()`.
//!
//! A limit is a token bucket: `burst` requests may be made at once and one
//! more becomes available every `replenish_ms` milliseconds.

/// Login and token refresh
pub const AUTH_REPLENISH_MS: u64 = 500;
pub const AUTH_BURST_SIZE: u32 = 10;

/// Registration, OTP and password reset: each request may send an email
pub const SENSITIVE_REPLENISH_MS: u64 = 20_000;
pub const SENSITIVE_BURST_SIZE: u32 = 5;

/// Everything else
pub const GENERAL_REPLENISH_MS: u64 = 50;
pub const GENERAL_BURST_SIZE: u32 = 60;

/// Build a `GovernorLayer` keyed by client IP for one route group.
#[macro_export]
macro_rules! make_rate_limit_layer {
    ($replenish_ms:expr, $burst:expr) => {{
        let config = ::tower_governor::governor::GovernorConfigBuilder::default()
            .key_extractor(::tower_governor::key_extractor::SmartIpKeyExtractor)
            .per_millisecond($replenish_ms)
            .burst_size($burst)
            .use_headers()
            .finish()
            .expect("rate limit period and burst size are non-zero");
        ::tower_governor::GovernorLayer::new(config)
    }};
}
