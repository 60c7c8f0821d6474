//! AMQP (RabbitMQ) 実装
//!
//! default exchange 経由で queue 名を routing key にして publish する。
//!
//! # 実装
//! - 接続は 1 ループにつき 1 本。startup 時のみ [`retry`] で再接続を試みる
//! - publisher は publisher confirms を有効化し、nack を publish 失敗として返す
//! - subscriber は `basic_qos(prefetch)` + explicit ack（`no_ack: false`）
//! - 途中で接続が切れた場合の再接続はしない（ループ側で fatal 扱い）

use std::fmt::Display;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{debug, info};

use crate::config::BrokerConfig;
use crate::domain::{AlertMessage, DeliveryTag, QueueError, QueueMessage};
use crate::ports::{AlertPublisher, AlertSubscription};
use crate::retry::retry;

const PERSISTENT: u8 = 2;
const CONSUMER_TAG: &str = "pacer-delivery";

fn connection_error(host: &str, err: impl Display) -> QueueError {
    QueueError::Connection {
        host: host.to_string(),
        reason: err.to_string(),
    }
}

/// Open a connection and one channel, retrying per the broker config.
async fn open(config: &BrokerConfig) -> Result<(Connection, Channel), QueueError> {
    let host = config.host();
    let attempt = || async {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| connection_error(&host, e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| connection_error(&host, format!("failed to create channel: {e}")))?;
        Ok::<_, QueueError>((connection, channel))
    };

    let opened = retry(&config.retry, config.connect_retries, "broker connection", attempt).await?;
    info!(host = %host, queue = %config.queue, "connected to message broker");
    Ok(opened)
}

async fn declare_durable(channel: &Channel, queue: &str) -> Result<(), QueueError> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                exclusive: false,
                auto_delete: false,
                nowait: false,
                passive: false,
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| QueueError::Declare {
            queue: queue.to_string(),
            reason: e.to_string(),
        })?;
    Ok(())
}

async fn close_connection(connection: &Connection) -> Result<(), QueueError> {
    if !connection.status().connected() {
        return Ok(());
    }
    connection
        .close(200, "Goodbye")
        .await
        .map_err(|e| QueueError::Close(e.to_string()))
}

/// Producer connection with publisher confirms enabled.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpPublisher {
    pub async fn connect(config: &BrokerConfig) -> Result<Self, QueueError> {
        let (connection, channel) = open(config).await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| connection_error(&config.host(), format!("failed to enable confirms: {e}")))?;

        Ok(Self {
            connection,
            channel,
            queue: config.queue.clone(),
        })
    }

    fn publish_error(&self, reason: impl Display) -> QueueError {
        QueueError::Publish {
            queue: self.queue.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl AlertPublisher for AmqpPublisher {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn ensure_queue(&mut self) -> Result<(), QueueError> {
        declare_durable(&self.channel, &self.queue).await
    }

    async fn publish(&mut self, alert: &AlertMessage) -> Result<(), QueueError> {
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type("text/plain".into())
            .with_message_id(alert.id().to_string().into())
            .with_timestamp(alert.created_at().timestamp().max(0) as u64);

        let confirm = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                alert.body(),
                properties,
            )
            .await
            .map_err(|e| self.publish_error(e))?;
        let confirmation = confirm.await.map_err(|e| self.publish_error(e))?;
        if confirmation.is_nack() {
            return Err(self.publish_error("broker nacked the message"));
        }

        debug!(queue = %self.queue, alert_id = %alert.id(), "publish confirmed");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        close_connection(&self.connection).await
    }
}

/// Consumer connection; deliveries must be acked explicitly.
pub struct AmqpSubscriber {
    connection: Connection,
    channel: Channel,
    queue: String,
    prefetch: u16,
    consumer: Option<Consumer>,
}

impl AmqpSubscriber {
    pub async fn connect(config: &BrokerConfig) -> Result<Self, QueueError> {
        let (connection, channel) = open(config).await?;
        Ok(Self {
            connection,
            channel,
            queue: config.queue.clone(),
            prefetch: config.prefetch,
            consumer: None,
        })
    }

    fn subscribe_error(&self, reason: impl Display) -> QueueError {
        QueueError::Subscribe {
            queue: self.queue.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl AlertSubscription for AmqpSubscriber {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn subscribe(&mut self) -> Result<(), QueueError> {
        declare_durable(&self.channel, &self.queue).await?;
        self.channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| self.subscribe_error(format!("failed to set prefetch: {e}")))?;

        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: false,
                    exclusive: false,
                    no_local: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| self.subscribe_error(e))?;

        info!(queue = %self.queue, prefetch = self.prefetch, "consumer started");
        self.consumer = Some(consumer);
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<QueueMessage>, QueueError> {
        let Some(consumer) = self.consumer.as_mut() else {
            return Err(QueueError::Receive {
                queue: self.queue.clone(),
                reason: "not subscribed".to_string(),
            });
        };

        match consumer.next().await {
            Some(Ok(delivery)) => {
                let durable = *delivery.properties.delivery_mode() == Some(PERSISTENT);
                Ok(Some(QueueMessage::new(
                    delivery.data,
                    DeliveryTag::new(delivery.delivery_tag),
                    durable,
                )))
            }
            Some(Err(e)) => Err(QueueError::Receive {
                queue: self.queue.clone(),
                reason: e.to_string(),
            }),
            None => Ok(None),
        }
    }

    async fn ack(&mut self, tag: DeliveryTag) -> Result<(), QueueError> {
        self.channel
            .basic_ack(tag.get(), BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Ack {
                queue: self.queue.clone(),
                tag,
                reason: e.to_string(),
            })
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        self.consumer = None;
        close_connection(&self.connection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_broker_reports_host() {
        let config = BrokerConfig {
            url: "amqp://127.0.0.1:1/%2f".to_string(),
            ..BrokerConfig::default()
        };

        let err = match AmqpPublisher::connect(&config).await {
            Ok(_) => panic!("connecting to a closed port must fail"),
            Err(err) => err,
        };
        match err {
            QueueError::Connection { host, .. } => assert_eq!(host, "127.0.0.1"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
