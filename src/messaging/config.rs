use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::config::parse_var;

const DEFAULT_EXCHANGE: &str = "turf-rating.ratings";
const DEFAULT_ROUTING_KEY: &str = "ratings.horses.calculated";

#[derive(Debug, Error, PartialEq)]
pub enum MessagingConfigError {
    #[error("{0} must be set when RABBITMQ_ENABLED is true")]
    Missing(&'static str)
}

/// Broker settings for the rating publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RabbitMqConfig {
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub username: String,
    pub password: String,
    /// Durable topic exchange receiving rating events
    pub exchange: String,
    pub routing_key: String,
    pub enabled: bool
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        RabbitMqConfig {
            host: "localhost".to_string(),
            port: 5672,
            vhost: "/".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            routing_key: DEFAULT_ROUTING_KEY.to_string(),
            enabled: false
        }
    }
}

impl RabbitMqConfig {
    /// Reads `RABBITMQ_*` variables. Credentials are only required once publishing is enabled.
    pub fn from_env() -> Result<Self, MessagingConfigError> {
        dotenv::dotenv().ok();

        let defaults = RabbitMqConfig::default();
        let enabled = parse_flag("RABBITMQ_ENABLED");
        if !enabled {
            return Ok(defaults);
        }

        Ok(RabbitMqConfig {
            host: env::var("RABBITMQ_HOST").unwrap_or(defaults.host),
            port: parse_var("RABBITMQ_PORT", defaults.port),
            vhost: env::var("RABBITMQ_VHOST").unwrap_or(defaults.vhost),
            username: required("RABBITMQ_USERNAME")?,
            password: required("RABBITMQ_PASSWORD")?,
            exchange: env::var("RABBITMQ_EXCHANGE").unwrap_or(defaults.exchange),
            routing_key: env::var("RABBITMQ_ROUTING_KEY").unwrap_or(defaults.routing_key),
            enabled
        })
    }

    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.username,
            self.password,
            self.host,
            self.port,
            self.vhost.replace('/', "%2F")
        )
    }
}

fn parse_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn required(name: &'static str) -> Result<String, MessagingConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(MessagingConfigError::Missing(name))
}
