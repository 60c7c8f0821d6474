//! DeliveryLoop - キューから alert を受け取り SMS で送る（consumer）
//!
//! # フロー（1 メッセージ）
//! 1. body を UTF-8 として decode
//! 2. **送信前に ack**（ack-first。ack と送信の間で落ちるとその SMS は失われる）
//! 3. NotifierSink で送信。成功は INFO、失敗は WARN。キューの状態には影響しない
//!
//! decode できない payload も ack して ERROR を出し、次へ進む。
//! ack の失敗と broker によるストリーム終了は fatal。

use tracing::{error, info, warn};

use super::shutdown::ShutdownSignal;
use super::status::DeliveryStats;
use crate::config::DeliveryConfig;
use crate::domain::{
    DeliveryPhase, MessageId, PhoneNumber, PipelineError, QueueError, QueueMessage, SendError,
};
use crate::ports::{AlertSubscription, NotifierSink};

/// What happened to one delivery. The delivery is acknowledged in every case.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    Dispatched(MessageId),
    SendFailed(SendError),
    Undecodable,
}

pub struct DeliveryLoop {
    subscription: Box<dyn AlertSubscription>,
    notifier: Box<dyn NotifierSink>,
    destination: PhoneNumber,
    phase: DeliveryPhase,
    stats: DeliveryStats,
}

impl DeliveryLoop {
    pub fn new(
        subscription: Box<dyn AlertSubscription>,
        notifier: Box<dyn NotifierSink>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            subscription,
            notifier,
            destination: config.destination,
            phase: DeliveryPhase::Idle,
            stats: DeliveryStats::default(),
        }
    }

    pub fn phase(&self) -> DeliveryPhase {
        self.phase
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    /// Handle one delivery: decode, ack, then dispatch.
    pub async fn process(&mut self, message: QueueMessage) -> Result<Processed, PipelineError> {
        self.stats.received += 1;
        let tag = message.delivery_tag();
        if !message.is_durable() {
            warn!(tag = %tag, "alert was not published as persistent; it would not survive a broker restart");
            self.stats.non_durable += 1;
        }

        self.phase = DeliveryPhase::Decoding;
        let decoded = message.decode_text().map(str::to_owned);

        if let Err(err) = self.subscription.ack(tag).await {
            self.phase = DeliveryPhase::Idle;
            return Err(err.into());
        }
        self.phase = DeliveryPhase::Acknowledged;
        self.stats.acked += 1;

        let text = match decoded {
            Ok(text) => text,
            Err(err) => {
                error!(tag = %tag, error = %err, bytes = message.body().len(), "undecodable alert acknowledged and dropped");
                self.stats.undecodable += 1;
                self.phase = DeliveryPhase::Idle;
                return Ok(Processed::Undecodable);
            }
        };
        info!(tag = %tag, text = %text, "alert received");

        self.phase = DeliveryPhase::Dispatching;
        let sent = self.notifier.send(&self.destination, &text).await;
        self.phase = DeliveryPhase::Idle;

        match sent {
            Ok(message_id) => {
                self.stats.dispatched += 1;
                info!(tag = %tag, message_id = %message_id, to = %self.destination, "text message sent");
                Ok(Processed::Dispatched(message_id))
            }
            Err(err) => {
                self.stats.send_failures += 1;
                warn!(tag = %tag, error = %err, kind = ?err.kind(), "text message not sent; alert is not retried");
                Ok(Processed::SendFailed(err))
            }
        }
    }

    /// Subscribe and consume until shutdown or a fatal error, then close the
    /// broker connection.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<DeliveryStats, PipelineError> {
        let result = self.consume_until_shutdown(&mut shutdown).await;

        if let Err(err) = self.subscription.close().await {
            warn!(error = %err, "failed to close broker connection");
        }
        match &result {
            Ok(()) => info!(stats = ?self.stats, "delivery loop stopped"),
            Err(err) => error!(error = %err, stats = ?self.stats, "delivery loop failed"),
        }
        result.map(|()| self.stats)
    }

    async fn consume_until_shutdown(&mut self, shutdown: &mut ShutdownSignal) -> Result<(), PipelineError> {
        self.subscription.subscribe().await?;
        info!(queue = self.subscription.queue(), to = %self.destination, "ready to receive alerts");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.recv() => return Ok(()),
                next = self.subscription.next() => next?,
            };
            let Some(message) = next else {
                return Err(QueueError::ConsumerClosed {
                    queue: self.subscription.queue().to_string(),
                }
                .into());
            };
            // a delivery in hand is always finished, even if shutdown arrives meanwhile
            self.process(message).await?;
        }
    }
}
