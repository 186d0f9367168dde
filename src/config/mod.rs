mod settings;

pub use settings::{
    BrokerConfig, EmailConfig, NotificationConfig, RiskConfig, SendGridConfig, ServerConfig,
    Settings, SmtpConfig, StorageConfig,
};
