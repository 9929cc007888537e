use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

use crate::pricing::PricingRates;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub pricing: PricingRates,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_cookie: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "session".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    /// Page size for the charge scan scoped to the requester's customer.
    #[serde(default = "default_customer_charge_scan_limit")]
    pub customer_charge_scan_limit: u64,
    /// Page size for the last-resort scan of the account's recent charges.
    #[serde(default = "default_recent_charge_scan_limit")]
    pub recent_charge_scan_limit: u64,
}

fn default_customer_charge_scan_limit() -> u64 {
    20
}

fn default_recent_charge_scan_limit() -> u64 {
    100
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            enabled: false,
            customer_charge_scan_limit: default_customer_charge_scan_limit(),
            recent_charge_scan_limit: default_recent_charge_scan_limit(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://visitpay.db")?
            .set_default("database.max_connections", 10)?
            .set_default("stripe.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with VISITPAY__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("VISITPAY").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://visitpay.db".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig::default(),
            stripe: StripeConfig::default(),
            pricing: PricingRates::default(),
        }
    }
}
