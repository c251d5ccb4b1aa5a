pub mod events;

#[cfg(feature = "messaging")]
pub mod config;
#[cfg(feature = "messaging")]
pub mod publisher;


#[cfg(feature = "messaging")]
pub use config::{MessagingConfigError, RabbitMqConfig};
pub use events::{PublisherError, RatingCalculatedMessage, RatingEventPublisher};
#[cfg(feature = "messaging")]
pub use publisher::RabbitMqPublisher;
