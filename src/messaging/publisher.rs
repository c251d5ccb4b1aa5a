use crate::messaging::{
    config::RabbitMqConfig,
    events::{PublisherError, RatingCalculatedMessage, RatingEventPublisher}
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions},
    publisher_confirm::Confirmation,
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MESSAGE_URN: &str = "urn:message:TurfRating.Messages:RatingCalculatedMessage";
const CONTENT_TYPE: &str = "application/vnd.masstransit+json";
const PERSISTENT: u8 = 2;

/// Wire format MassTransit consumers expect.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MassTransitEnvelope<T> {
    pub message_id: String,
    pub conversation_id: String,
    pub correlation_id: Option<String>,
    pub source_address: String,
    pub destination_address: String,
    pub message_type: Vec<String>,
    pub message: T,
    pub sent_time: DateTime<Utc>
}

impl MassTransitEnvelope<RatingCalculatedMessage> {
    pub(crate) fn wrap(message: &RatingCalculatedMessage, exchange: &str, sent_time: DateTime<Utc>) -> Self {
        MassTransitEnvelope {
            message_id: Uuid::new_v4().to_string(),
            conversation_id: Uuid::new_v4().to_string(),
            correlation_id: message.correlation_id.clone(),
            source_address: "rabbitmq://localhost/turf-rating".to_string(),
            destination_address: format!("rabbitmq://localhost/{exchange}"),
            message_type: vec![MESSAGE_URN.to_string()],
            message: message.clone(),
            sent_time
        }
    }
}

/// Publishes to a durable topic exchange with publisher confirms enabled.
pub struct RabbitMqPublisher {
    session: Option<(Connection, Channel)>,
    exchange: String,
    routing_key: String
}

impl RabbitMqPublisher {
    /// A publisher that has not connected yet. Publishing fails until [`open`](Self::open) succeeds.
    pub fn from_config(config: &RabbitMqConfig) -> Self {
        RabbitMqPublisher {
            session: None,
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone()
        }
    }

    pub async fn connect_from_config(config: &RabbitMqConfig) -> Result<Self, PublisherError> {
        let mut publisher = Self::from_config(config);
        publisher.open(&config.amqp_uri()).await?;

        Ok(publisher)
    }

    pub async fn open(&mut self, uri: &str) -> Result<(), PublisherError> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default()
            )
            .await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;

        info!(exchange = %self.exchange, routing_key = %self.routing_key, "Rating publisher connected");
        self.session = Some((connection, channel));

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|(connection, channel)| connection.status().connected() && channel.status().connected())
    }

    pub async fn close(&mut self) -> Result<(), PublisherError> {
        if let Some((connection, channel)) = self.session.take() {
            channel.close(200, "Publisher closed").await?;
            connection.close(200, "Publisher closed").await?;
            info!("Rating publisher closed");
        }

        Ok(())
    }
}

#[async_trait]
impl RatingEventPublisher for RabbitMqPublisher {
    async fn publish_rating_calculated(&self, message: &RatingCalculatedMessage) -> Result<(), PublisherError> {
        let (_, channel) = self.session.as_ref().ok_or(PublisherError::NotConnected)?;

        let sent_time = Utc::now();
        let envelope = MassTransitEnvelope::wrap(message, &self.exchange, sent_time);
        let payload = serde_json::to_vec(&envelope)?;

        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE.into())
            .with_message_id(envelope.message_id.clone().into())
            .with_delivery_mode(PERSISTENT)
            .with_timestamp(sent_time.timestamp() as u64);

        let confirmation = channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties
            )
            .await?
            .await?;

        if let Confirmation::Nack(_) = confirmation {
            return Err(PublisherError::NotAcknowledged {
                message_id: envelope.message_id
            });
        }

        debug!(
            horse_id = message.horse_id,
            rating_id = message.rating_id,
            message_id = %envelope.message_id,
            "Published rating calculated message"
        );

        Ok(())
    }
}

impl Drop for RabbitMqPublisher {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("Rating publisher dropped while still connected");
        }
    }
}
