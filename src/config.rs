use config::{Config, ConfigError, File};
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::{
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions,
};
use std::time::Duration;

use crate::delivery::RetryPolicy;
use crate::domain::new_subscriber::SeedSubscriber;
use crate::domain::subscriber_email::SubscriberEmail;

#[derive(Debug)]
pub enum Environment {
    Development,
    Production,
}

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub smtp: SmtpSettings,
    pub email: EmailSettings,
    pub delivery: DeliverySettings,
    pub quotes: QuoteSourceSettings,
    // Added (if missing) at the start of every run
    #[serde(default)]
    pub subscribers: Vec<SeedSubscriber>,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    // secrecy protects secret information and prevents them to be exposed (eg: via logs)
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub name: String,
    pub require_ssl: bool,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plaintext session, only meant for local relays and tests
    None,
    StartTls,
    Tls,
}

#[derive(serde::Deserialize, Clone)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    pub security: SmtpSecurity,
    pub timeout_seconds: Option<u64>,
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailSettings {
    pub sender_email: String,
    pub operator_email: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct DeliverySettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_retries: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub base_delay_seconds: f64,
}

#[derive(serde::Deserialize, Clone)]
pub struct QuoteSourceSettings {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub limit: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_seconds: u64,
}

impl Settings {
    pub fn get_db_options(&self) -> PgConnectOptions {
        self.database.get_db_options()
    }

    pub fn get_sender_email(&self) -> Result<SubscriberEmail, String> {
        self.email.get_sender_email()
    }

    pub fn get_operator_email(&self) -> Result<SubscriberEmail, String> {
        self.email.get_operator_email()
    }

    pub fn get_retry_policy(&self) -> RetryPolicy {
        self.delivery.get_retry_policy()
    }

    pub fn get_quotes_base_url(&self) -> String {
        self.quotes.base_url.clone()
    }

    pub fn get_quotes_timeout(&self) -> Duration {
        self.quotes.get_timeout()
    }

    pub fn set_quotes_base_url(&mut self, new_base_url: String) {
        self.quotes.base_url = new_base_url
    }
}

impl DatabaseSettings {
    pub fn get_db_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        let mut db_options = PgConnectOptions::new()
            .host(&self.host)
            .password(self.password.expose_secret())
            .username(&self.username)
            .port(self.port)
            .database(&self.name)
            .ssl_mode(ssl_mode);

        db_options.log_statements(tracing::log::LevelFilter::Trace);

        db_options
    }

    /// Options for the server itself, used to create per-test databases.
    pub fn get_server_options(&self) -> PgConnectOptions {
        self.get_db_options().database("postgres")
    }

    pub fn set_name(&mut self, new_db_name: String) {
        self.name = new_db_name
    }
}

impl EmailSettings {
    pub fn get_sender_email(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.sender_email.clone())
    }

    pub fn get_operator_email(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.operator_email.clone())
    }
}

impl DeliverySettings {
    pub fn get_retry_policy(&self) -> RetryPolicy {
        let base_delay =
            Duration::try_from_secs_f64(self.base_delay_seconds).unwrap_or(Duration::ZERO);

        RetryPolicy::new(self.max_retries, base_delay)
    }
}

impl QuoteSourceSettings {
    pub fn get_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            unknown_env => Err(format!(
                "{} is not supported environment. Use either 'development' or 'production'.",
                unknown_env
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let root_path = std::env::current_dir()
        .map_err(|err| ConfigError::Message(format!("Failed to determine the current directory: {}", err)))?;
    let config_directory = root_path.join("config");
    // Uses development environment by default
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "development".into())
        .try_into()
        .map_err(ConfigError::Message)?;
    let config_base_filepath = config_directory.join("base");
    let config_env_filepath = config_directory.join(environment.as_str());

    // It merges the base configuration file with the one from the specific environment (development or production)
    let settings = Config::builder()
        .add_source(File::from(config_base_filepath).required(true))
        .add_source(File::from(config_env_filepath).required(true))
        // Merge settings from environment variables with a prefix of APP and "__" separator
        // E.g APP_SMTP__PORT would set Settings.smtp.port
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?;

    tracing::info!("Application environment = {:?}", environment);

    // Try to convert the value from the configuration file into a Settings type
    settings.try_deserialize()
}
