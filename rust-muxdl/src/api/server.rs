//! API server setup and configuration.

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, Method, header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, warn};

use crate::api::routes;
use crate::error::{Error, Result};
use crate::pipeline::DownloadService;

/// Origin allowed when `CORS_ALLOWED_ORIGINS` is unset.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5001,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
        }
    }
}

impl ApiServerConfig {
    /// Load API server config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `API_BIND_ADDRESS` (e.g. "0.0.0.0")
    /// - `API_PORT` (e.g. "5001")
    /// - `CORS_ALLOWED_ORIGINS` (comma-separated, or "*")
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind_address) = lookup("API_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            config.bind_address = bind_address.trim().to_string();
        }

        if let Some(port) = lookup("API_PORT") {
            match port.trim().parse::<u16>() {
                Ok(parsed) => config.port = parsed,
                Err(_) => warn!(value = %port, "Invalid API_PORT, using default {}", config.port),
            }
        }

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
            if !origins.is_empty() {
                config.cors_origins = origins;
            }
        }

        config
    }

    fn cors_layer(&self) -> CorsLayer {
        let base = CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(Any)
            .expose_headers([header::CONTENT_DISPOSITION, header::CONTENT_TYPE]);

        if self.cors_origins.iter().any(|o| o == "*") {
            return base.allow_origin(Any);
        }
        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        base.allow_origin(AllowOrigin::list(origins))
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub download_service: Arc<DownloadService>,
}

impl AppState {
    pub fn new(download_service: Arc<DownloadService>) -> Self {
        Self {
            start_time: Instant::now(),
            download_service,
        }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        routes::create_router(self.state.clone())
            .layer(self.config.cors_layer())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &Request| {
                        if req.uri().path().starts_with("/health") {
                            Span::none()
                        } else {
                            let mut make_span = tower_http::trace::DefaultMakeSpan::new()
                                .level(tracing::Level::INFO);
                            use tower_http::trace::MakeSpan;
                            make_span.make_span(req)
                        }
                    })
                    .on_response(
                        |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                            if span.is_disabled() {
                                return;
                            }
                            let on_response = tower_http::trace::DefaultOnResponse::new()
                                .level(tracing::Level::INFO);
                            use tower_http::trace::OnResponse;
                            on_response.on_response(res, latency, span);
                        },
                    ),
            )
    }

    /// Start the server.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| Error::Other(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 5001);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ApiServerConfig::from_lookup(lookup(&[
            ("API_BIND_ADDRESS", "127.0.0.1"),
            ("API_PORT", "8080"),
            ("CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test,"),
        ]));
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_invalid_port_keeps_default() {
        let config = ApiServerConfig::from_lookup(lookup(&[("API_PORT", "not-a-port")]));
        assert_eq!(config.port, 5001);
    }
}
