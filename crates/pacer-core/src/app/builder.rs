//! LoopBuilder - ループの構築とワイヤリング
//!
//! # Fail-fast
//! - `build_producer()` / `build_consumer()` はそれぞれ必要な部品が揃っているかを確認する
//! - 不足があれば接続前に [`BuildError::MissingComponents`] を返す
//! - config の `validate()` もここで走らせる

use super::delivery_loop::DeliveryLoop;
use super::poll_loop::PollLoop;
use crate::config::{DeliveryConfig, PollConfig};
use crate::domain::ConfigError;
use crate::ports::{ActivityQuerySource, AlertPublisher, AlertSubscription, NotifierSink, SessionProvider};

/// BuildError はループ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing components: {0:?}. These must be provided before building the loop.")]
    MissingComponents(Vec<&'static str>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Collects ports and configuration for either loop.
///
/// # 使用例
/// ```ignore
/// let poll_loop = LoopBuilder::new()
///     .source(Box::new(source))
///     .sessions(Box::new(sessions))
///     .publisher(Box::new(publisher))
///     .poll_config(config)
///     .build_producer()?;
/// ```
#[derive(Default)]
pub struct LoopBuilder {
    source: Option<Box<dyn ActivityQuerySource>>,
    sessions: Option<Box<dyn SessionProvider>>,
    publisher: Option<Box<dyn AlertPublisher>>,
    subscription: Option<Box<dyn AlertSubscription>>,
    notifier: Option<Box<dyn NotifierSink>>,
    poll_config: PollConfig,
    delivery_config: Option<DeliveryConfig>,
}

impl LoopBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: Box<dyn ActivityQuerySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sessions(mut self, sessions: Box<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn publisher(mut self, publisher: Box<dyn AlertPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn subscription(mut self, subscription: Box<dyn AlertSubscription>) -> Self {
        self.subscription = Some(subscription);
        self
    }

    pub fn notifier(mut self, notifier: Box<dyn NotifierSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.poll_config = config;
        self
    }

    pub fn delivery_config(mut self, config: DeliveryConfig) -> Self {
        self.delivery_config = Some(config);
        self
    }

    pub fn build_producer(self) -> Result<PollLoop, BuildError> {
        self.poll_config.validate()?;
        match (self.source, self.sessions, self.publisher) {
            (Some(source), Some(sessions), Some(publisher)) => {
                Ok(PollLoop::new(source, sessions, publisher, self.poll_config))
            }
            (source, sessions, publisher) => {
                let mut missing = Vec::new();
                if source.is_none() {
                    missing.push("activity source");
                }
                if sessions.is_none() {
                    missing.push("session provider");
                }
                if publisher.is_none() {
                    missing.push("publisher");
                }
                Err(BuildError::MissingComponents(missing))
            }
        }
    }

    pub fn build_consumer(self) -> Result<DeliveryLoop, BuildError> {
        match (self.subscription, self.notifier, self.delivery_config) {
            (Some(subscription), Some(notifier), Some(config)) => {
                Ok(DeliveryLoop::new(subscription, notifier, config))
            }
            (subscription, notifier, config) => {
                let mut missing = Vec::new();
                if subscription.is_none() {
                    missing.push("subscription");
                }
                if notifier.is_none() {
                    missing.push("notifier");
                }
                if config.is_none() {
                    missing.push("delivery config");
                }
                Err(BuildError::MissingComponents(missing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PhoneNumber;
    use crate::impls::InMemoryBroker;
    use crate::testing::{RecordingNotifier, ScriptedSource, StaticSessions};
    use std::time::Duration;

    #[tokio::test]
    async fn producer_builds_with_all_components() {
        let broker = InMemoryBroker::new();
        let built = LoopBuilder::new()
            .source(Box::new(ScriptedSource::new(vec![])))
            .sessions(Box::new(StaticSessions::token("abc")))
            .publisher(Box::new(broker.publisher("alerts").await))
            .build_producer();
        assert!(built.is_ok());
    }

    #[test]
    fn producer_reports_every_missing_component() {
        let built = LoopBuilder::new()
            .source(Box::new(ScriptedSource::new(vec![])))
            .build_producer();
        assert!(matches!(
            built,
            Err(BuildError::MissingComponents(missing)) if missing == vec!["session provider", "publisher"]
        ));
    }

    #[test]
    fn producer_rejects_invalid_config() {
        let built = LoopBuilder::new()
            .poll_config(PollConfig {
                min_poll_interval: Duration::ZERO,
                ..PollConfig::default()
            })
            .build_producer();
        assert!(matches!(built, Err(BuildError::Config(ConfigError::Zero(_)))));
    }

    #[tokio::test]
    async fn consumer_needs_a_destination() {
        let broker = InMemoryBroker::new();
        let built = LoopBuilder::new()
            .subscription(Box::new(broker.subscriber("alerts").await))
            .notifier(Box::new(RecordingNotifier::new()))
            .build_consumer();
        assert!(matches!(
            built,
            Err(BuildError::MissingComponents(missing)) if missing == vec!["delivery config"]
        ));

        let built = LoopBuilder::new()
            .subscription(Box::new(broker.subscriber("alerts").await))
            .notifier(Box::new(RecordingNotifier::new()))
            .delivery_config(DeliveryConfig {
                destination: PhoneNumber::parse("+15551234567").unwrap(),
            })
            .build_consumer();
        assert!(built.is_ok());
    }
}
