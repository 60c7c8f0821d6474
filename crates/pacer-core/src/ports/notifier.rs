//! NotifierSink port - SMS 送信

use async_trait::async_trait;

use crate::domain::{MessageId, PhoneNumber, SendError};

/// Sends a text message. The source number is part of the implementation's
/// static configuration.
#[async_trait]
pub trait NotifierSink: Send + Sync {
    async fn send(&self, to: &PhoneNumber, text: &str) -> Result<MessageId, SendError>;
}
