//! HTTP API: a thin adapter over the download service.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
