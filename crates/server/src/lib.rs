//! HTTP server for the custom phone case shop.
//!
//! Exposes the storefront API (order submission, payments, store locations),
//! the authenticated admin back-office, plus health and Prometheus metrics
//! endpoints.

pub mod admin;
pub mod auth;
pub mod error;
pub mod metrics;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use payment::StripeClient;
use repository::{OrdersRepository, StoreLocationsRepository};
use service::OrderWorkflow;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

pub use auth::AuthConfig;
pub use metrics::Metrics;

/// Application state shared between request handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<OrderWorkflow>,
    pub orders: Arc<dyn OrdersRepository>,
    pub locations: Arc<dyn StoreLocationsRepository>,
    pub payments: Arc<StripeClient>,
    pub auth: AuthConfig,
    pub webhook_secret: String,
    pub metrics: Arc<Metrics>,
}

/// Server represents the HTTP server for the shop API.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(port: u16, state: AppState) -> Self {
        info!("Initializing HTTP server on port {}", port);
        Self { port, state }
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = create_router(self.state.clone());

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }
}

pub fn create_router(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    let admin_routes = Router::new()
        .route("/dashboard-stats", get(admin::handle_dashboard_stats))
        .route("/orders", get(admin::handle_list_orders))
        .route("/orders/export", get(admin::handle_export_csv))
        .route("/orders/clear-all", delete(admin::handle_clear_all))
        .route(
            "/orders/{id}",
            get(admin::handle_get_order).delete(admin::handle_delete_order),
        )
        .route("/orders/{id}/status", put(admin::handle_update_status))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/api/orders", post(orders::handle_submit_order))
        .route("/api/locations", get(orders::handle_list_locations))
        .route(
            "/api/locations/search",
            get(orders::handle_search_locations),
        )
        .route("/api/locations/{id}", get(orders::handle_get_location))
        .route(
            "/api/payments/create-order",
            post(payments::handle_create_order),
        )
        .route(
            "/api/payments/confirm-payment",
            post(payments::handle_confirm_payment),
        )
        .route(
            "/api/payments/create-payment-intent",
            post(payments::handle_create_payment_intent),
        )
        .route(
            "/api/payments/create-checkout-session",
            post(payments::handle_create_checkout_session),
        )
        .route("/api/payments/webhook", post(payments::handle_webhook))
        .route(
            "/api/payments/payment-status/{id}",
            get(payments::handle_payment_status),
        )
        .nest(
            "/api/admin",
            Router::new()
                .route("/login", post(auth::handle_login))
                .merge(admin_routes),
        )
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            metrics_middleware,
        ))
        .with_state(state)
}

/// Middleware for collecting metrics on HTTP requests.
async fn metrics_middleware(
    State(metrics): State<Arc<Metrics>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let start = std::time::Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16();

    metrics.record_request(&method, &path, status, start.elapsed());
    if status >= 400 {
        metrics.record_error("http", &path);
    }

    response
}

async fn handle_health() -> &'static str {
    "OK"
}

async fn handle_metrics(State(state): State<AppState>) -> Response {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    match String::from_utf8(buffer) {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            error!("Failed to convert metrics to UTF-8: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data").into_response()
        }
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
