//! Lodestone Service
//!
//! Process wiring for the classification pipeline: configuration loading,
//! tracing and metrics setup, store connections, and the admin HTTP surface.

pub mod bootstrap;
pub mod config;
pub mod routes;
pub mod telemetry;

pub use bootstrap::{build, Components, Stores};
pub use config::ServiceConfig;
pub use routes::{create_router, AppState};
