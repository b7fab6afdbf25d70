//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, limits, headers)
//! - Rate limit the API, gate the task routes
//! - Run the idle bucket sweeper alongside the server
//! - Serve until the shutdown broadcast fires

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{SigningSecret, TokenCodec};
use crate::config::AppConfig;
use crate::http::handlers::{auth, health, tasks};
use crate::http::request::{request_id_of, UuidRequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::security::headers::apply_security_headers;
use crate::security::{rate_limit_middleware, require_auth, BucketSweeper, RateLimiter};
use crate::store::SqliteStore;

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub codec: Arc<TokenCodec>,
    pub limiter: Arc<RateLimiter>,
    pub store: Arc<SqliteStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<SqliteStore>) -> Self {
        let secret = SigningSecret::resolve(config.auth.jwt_secret.as_deref());
        if secret.is_insecure_default() {
            tracing::warn!("JWT_SECRET not set, using insecure development secret");
        }

        let ttl = Duration::from_secs(config.auth.token_ttl_hours.saturating_mul(3600));
        let codec = Arc::new(TokenCodec::new(&secret, ttl));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config: Arc::new(config),
            codec,
            limiter,
            store,
        }
    }
}

/// HTTP server for the task API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and store.
    pub fn new(config: AppConfig, store: Arc<SqliteStore>) -> Self {
        let state = AppState::new(config, store);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();

        let protected = Router::new()
            .route("/api/tasks", post(tasks::create_task).get(tasks::list_tasks))
            .route(
                "/api/tasks/{id}",
                get(tasks::get_task)
                    .put(tasks::update_task)
                    .delete(tasks::delete_task),
            )
            .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

        let api = Router::new()
            .route("/api/register", post(auth::register))
            .route("/api/login", post(auth::login))
            .merge(protected)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ));

        let mut router = Router::new()
            .route("/health", get(health::health))
            .merge(api)
            .with_state(state)
            .layer(middleware::from_fn(metrics::track_requests));

        if config.security.enable_headers {
            router = apply_security_headers(router);
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id_of(request),
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                // Wraps the timeout: `Timeout` builds its 408 from a `Default` body.
                .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.timeouts.request_secs,
                ))),
        )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires (or its sender is dropped).
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let rate_limit = &self.state.config.rate_limit;
        let sweeper = if rate_limit.enabled {
            let sweeper = BucketSweeper::new(
                self.state.limiter.clone(),
                Duration::from_secs(rate_limit.sweep_interval_secs),
            );
            Some(sweeper.spawn(shutdown.resubscribe()))
        } else {
            None
        };

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        if let Some(handle) = sweeper {
            handle.abort();
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
