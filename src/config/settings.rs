use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub notification: NotificationConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub risk: RiskConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Tenant-facing notification behavior: the public hostname used in
/// unsubscribe links and the blob folder holding template bodies.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub self_host: String,
    #[serde(default = "default_template_folder")]
    pub template_folder: String,
    #[serde(default = "default_contact_channel")]
    pub contact_channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Dispatcher backend: "smtp", "sendgrid" or "log"
    #[serde(default = "default_email_backend")]
    pub backend: String,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub sendgrid: SendGridConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SendGridConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_sendgrid_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Broker backend: "redis" or "memory"
    #[serde(default = "default_broker_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_broker_prefix")]
    pub prefix: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_notify_topic")]
    pub notify_topic: String,
    #[serde(default = "default_subscribe_topic")]
    pub subscribe_topic: String,
    #[serde(default = "default_subscribed_topic")]
    pub subscribed_topic: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Optional JSON file seeding the template metadata store at startup
    pub templates_file: Option<String>,
    /// Root directory for template body blobs; memory store when unset
    pub blob_root: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// reCAPTCHA secret; when unset every visitor is accepted
    pub recaptcha_secret: Option<String>,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_template_folder() -> String {
    "emailtemplates".to_string()
}

fn default_contact_channel() -> String {
    "contactus".to_string()
}

fn default_email_backend() -> String {
    "log".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    1025
}

fn default_sendgrid_url() -> String {
    "https://api.sendgrid.com/v3".to_string()
}

fn default_broker_backend() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_broker_prefix() -> String {
    "herald:broker".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_notify_topic() -> String {
    "notify-command".to_string()
}

fn default_subscribe_topic() -> String {
    "subscribe-command".to_string()
}

fn default_subscribed_topic() -> String {
    "subscribed-event".to_string()
}

fn default_min_score() -> f64 {
    0.5
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("notification.self_host", "localhost:8082")?
            .set_default("notification.template_folder", "emailtemplates")?
            .set_default("broker.backend", "memory")?
            .set_default("email.backend", "log")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, BROKER_REDIS_URL, EMAIL_BACKEND, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            backend: default_email_backend(),
            smtp: SmtpConfig::default(),
            sendgrid: SendGridConfig::default(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            use_tls: false,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: default_broker_backend(),
            redis_url: default_redis_url(),
            prefix: default_broker_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            notify_topic: default_notify_topic(),
            subscribe_topic: default_subscribe_topic(),
            subscribed_topic: default_subscribed_topic(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            recaptcha_secret: None,
            min_score: default_min_score(),
        }
    }
}
