//! HTTP API Module
//!
//! Provides the HTTP server: the script evaluation endpoint plus
//! health/metrics endpoints.

pub mod dto;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::protocol::Handler;

use self::handlers::{admin, script};

/// Middleware: API key authentication.
/// Checks for `Authorization: Bearer <key>` header.
/// Skips auth for /health and /live endpoints (health checks must work unauthenticated).
async fn auth_middleware(
    Extension(api_keys): Extension<ApiKeys>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if path == "/health" || path == "/live" {
        return next.run(req).await;
    }

    let keys = &api_keys.0;
    if keys.is_empty() {
        return next.run(req).await;
    }

    let token = req
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if token.is_some_and(|token| keys.iter().any(|k| k == token)) {
        return next.run(req).await;
    }

    warn!(path = %path, "http_auth_rejected");
    error::RestError::unauthorized("Invalid or missing API key").into_response()
}

#[derive(Clone)]
struct ApiKeys(Arc<Vec<String>>);

/// Creates the Axum router
pub fn create_router(handler: Arc<Handler>, config: &HttpConfig) -> Router {
    let cors = if !config.cors_origins.is_empty() {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| {
                let parsed = s.parse();
                if parsed.is_err() {
                    warn!(origin = %s, "invalid_cors_origin_ignored");
                }
                parsed.ok()
            })
            .collect();
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if config.cors_allow_all {
        Some(CorsLayer::permissive())
    } else {
        // Default: same-origin only
        None
    };

    let mut app = Router::new()
        .route("/health", get(admin::health))
        .route("/live", get(admin::liveness))
        .route("/metrics", get(admin::stats))
        .route("/api/v1/evaluate-script", post(script::evaluate_script))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(Extension(handler));

    // Extension must be the OUTER layer (applied last) so the middleware can extract it.
    // In Axum, .layer(A).layer(B) means B wraps A, so B runs first.
    if config.auth.enabled && !config.auth.api_keys.is_empty() {
        let api_keys = ApiKeys(Arc::new(config.auth.api_keys.clone()));
        app = app
            .layer(middleware::from_fn(auth_middleware))
            .layer(Extension(api_keys));
    }

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Listens for SIGINT (ctrl-c) and SIGTERM to trigger graceful shutdown.
/// In-flight evaluations finish before the server returns.
pub async fn start_http_server(
    handler: Arc<Handler>,
    config: &HttpConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(Arc::clone(&handler), config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(%addr, "http_server_listening");

    let socket = if addr.is_ipv6() {
        tokio::net::TcpSocket::new_v6()?
    } else {
        tokio::net::TcpSocket::new_v4()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stats = handler.stats();
    info!(
        invocations = stats.invocations,
        failures = stats.failures,
        uptime_secs = handler.uptime_seconds(),
        "http_server_stopped"
    );
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_failed");
                ctrl_c.await;
                info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("received SIGINT, shutting down");
    }
}
