//! Course reviews, instructor responses and helpfulness votes.
//!
//! Each write that can change the set of approved reviews recomputes the
//! course rating in the same transaction; each vote recomputes the review's
//! counters.

pub mod model;
pub mod routes;

pub use routes::routes;
