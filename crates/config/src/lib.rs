use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// `AppConfig` holds all configuration parameters required by the application.
///
/// The configuration is loaded from environment variables (optionally via a
/// `.env` file) or uses default values if the variable is not set. Fields
/// cover the database, HTTP server, payment processor, email/SMS providers,
/// and admin authentication. This struct is deserializable via Serde.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Database settings ---
    /// Database hostname or service name (e.g. "postgres" in Docker Compose,
    /// "localhost" for local runs).
    pub db_host: String,
    /// Database port (default: 5432).
    pub db_port: u16,
    /// Database user.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Database name.
    pub db_name: String,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,

    // --- Shutdown timeout ---
    /// Graceful shutdown timeout (human-friendly format, e.g. "5s", "1m").
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub shutdown_timeout: Duration,

    // --- Payment processor ---
    /// Secret API key for the payment processor. Empty or placeholder values
    /// put the payment adapter in an unconfigured state.
    pub stripe_secret_key: String,
    /// Signing secret used to verify incoming webhook payloads.
    pub stripe_webhook_secret: String,

    // --- Email provider ---
    /// SendGrid API key. Real keys start with "SG."; anything else selects
    /// the simulation mailer at startup.
    pub sendgrid_api_key: String,
    /// Sender address for all outbound mail.
    pub email_from: String,
    /// Operator address that receives a copy of every order notification.
    pub admin_email: String,

    // --- SMS provider ---
    /// Twilio account SID. SMS is disabled when any Twilio field is empty.
    pub twilio_account_sid: String,
    /// Twilio auth token.
    pub twilio_auth_token: String,
    /// Sender phone number in E.164 format.
    pub twilio_from_number: String,

    // --- Admin back-office ---
    /// Secret used to sign admin JWTs.
    pub jwt_secret: String,
    /// Admin login username.
    pub admin_username: String,
    /// Admin login password.
    pub admin_password: String,

    // --- Frontend ---
    /// Public origin of the storefront, used to build links embedded in
    /// emails and checkout redirect URLs.
    pub frontend_url: String,
}

/// Custom deserializer for graceful shutdown timeout.
/// Accepts human-readable formats like "5s", "1m", etc.
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from a
    /// `.env` file).
    ///
    /// Fields not set via env will be filled with default values. Provider
    /// credentials default to empty strings, which selects the degraded
    /// (simulation) providers at startup instead of failing.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid.
    pub fn load() -> Result<Self> {
        // Load from .env file (for Docker environment)
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "cases_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "cases_db")?
            // HTTP
            .set_default("http_port", 8081)?
            // Shutdown
            .set_default("shutdown_timeout", "5s")?
            // Payment processor
            .set_default("stripe_secret_key", "")?
            .set_default("stripe_webhook_secret", "")?
            // Email
            .set_default("sendgrid_api_key", "")?
            .set_default("email_from", "orders@example.com")?
            .set_default("admin_email", "orders@example.com")?
            // SMS
            .set_default("twilio_account_sid", "")?
            .set_default("twilio_auth_token", "")?
            .set_default("twilio_from_number", "")?
            // Admin
            .set_default("jwt_secret", "dev-only-secret")?
            .set_default("admin_username", "admin")?
            .set_default("admin_password", "admin")?
            // Frontend
            .set_default("frontend_url", "http://localhost:5173")?
            .add_source(config::Environment::default())
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// Connection string for the Postgres pool.
    pub fn db_dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode=disable",
            self.db_host, self.db_port, self.db_user, self.db_password, self.db_name
        )
    }

    /// True when a real SendGrid key is configured; otherwise the mailer runs
    /// in simulation mode.
    pub fn email_configured(&self) -> bool {
        self.sendgrid_api_key.starts_with("SG.")
    }

    /// True when all Twilio credentials are present.
    pub fn sms_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_from_number.is_empty()
    }
}
