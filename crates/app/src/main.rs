/// Phone Case Shop Backend
///
/// Main entry point for the custom phone case shop service.
/// The application exposes REST API endpoints for order submission,
/// payment processing and the admin back-office.
///
/// # Architecture
///
/// - Repository layer for data access
/// - Workflow layer for the order lifecycle
/// - Notification dispatcher for admin/customer messaging
/// - API layer for HTTP endpoints
/// - Metrics for monitoring
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use app_config::AppConfig;
use notifier::{Dispatcher, EmailProvider, NullMailer, SendGridMailer, SmsProvider, TwilioSender};
use payment::StripeClient;
use repository::{
    OrdersRepository, PgOrdersRepository, PgStoreLocationsRepository, StoreLocationsRepository,
};
use server::{AppState, AuthConfig, Metrics, Server};
use service::OrderWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Phone case shop backend starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db_pool = match db::init_db_pool(&config).await {
        Ok(pool) => {
            info!("Database initialized successfully");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(anyhow::anyhow!("Database connection is required"));
        }
    };

    let orders: Arc<dyn OrdersRepository> = Arc::new(PgOrdersRepository::new(db_pool.clone()));
    let locations: Arc<dyn StoreLocationsRepository> =
        Arc::new(PgStoreLocationsRepository::new(db_pool.clone()));

    let email: Arc<dyn EmailProvider> = if config.email_configured() {
        info!("Email notifications enabled");
        Arc::new(SendGridMailer::new(
            config.sendgrid_api_key.clone(),
            config.email_from.clone(),
        ))
    } else {
        warn!("SENDGRID_API_KEY not set; emails will be logged and dropped");
        Arc::new(NullMailer::new())
    };

    let sms: Option<Arc<dyn SmsProvider>> = if config.sms_configured() {
        info!("SMS notifications enabled");
        Some(Arc::new(TwilioSender::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_from_number.clone(),
        )))
    } else {
        warn!("Twilio credentials not set; SMS notifications disabled");
        None
    };

    let dispatcher = Dispatcher::new(
        email,
        sms,
        config.admin_email.clone(),
        config.frontend_url.clone(),
    );
    let workflow = Arc::new(OrderWorkflow::new(orders.clone(), dispatcher));

    let payments = Arc::new(StripeClient::new(config.stripe_secret_key.clone()));

    let state = AppState {
        workflow,
        orders,
        locations,
        payments,
        auth: AuthConfig {
            jwt_secret: config.jwt_secret.clone(),
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password.clone(),
        },
        webhook_secret: config.stripe_webhook_secret.clone(),
        metrics: Arc::new(Metrics::default()),
    };

    let server = Server::new(config.http_port, state);
    server.start().await?;

    info!("Application stopped");
    Ok(())
}
