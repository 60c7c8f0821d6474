//! Errors - エラー型と分類
//!
//! 各境界（activity source / SMS carrier / broker / config）ごとに enum を分け、
//! すべてを [`ErrorKind`] で運用分類できるようにします。
//!
//! # 分類
//! - Transient: 一時的なエラー（次の tick で回復しうる）
//! - Permanent: 恒久的なエラー（同じ入力で再試行しても無意味）
//! - Infrastructure: インフラエラー（ブローカー接続・プロトコル）

use super::ids::DeliveryTag;

/// ErrorKind は実行エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Failures reported by an activity source or session provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("activity source rejected the session: {0}")]
    Auth(String),

    #[error("activity source is rate limiting requests: {0}")]
    RateLimited(String),

    #[error("activity source unavailable: {0}")]
    Transient(String),
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Auth(_) => ErrorKind::Permanent,
            SourceError::RateLimited(_) | SourceError::Transient(_) => ErrorKind::Transient,
        }
    }
}

/// Failures reported by the SMS carrier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("carrier rejected the message (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("carrier request failed: {0}")]
    Transport(String),
}

impl SendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SendError::Rejected { status, .. } if *status >= 500 => ErrorKind::Transient,
            SendError::Rejected { .. } => ErrorKind::Permanent,
            SendError::Transport(_) => ErrorKind::Transient,
        }
    }
}

/// Broker-side failures. Every variant is fatal for the loop that hits it.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(
        "connection to the message broker at {host} failed: {reason}. Verify the server is running on host={host}."
    )]
    Connection { host: String, reason: String },

    #[error("failed to declare queue '{queue}': {reason}")]
    Declare { queue: String, reason: String },

    #[error("failed to publish to queue '{queue}': {reason}")]
    Publish { queue: String, reason: String },

    #[error("failed to subscribe to queue '{queue}': {reason}")]
    Subscribe { queue: String, reason: String },

    #[error("failed to receive from queue '{queue}': {reason}")]
    Receive { queue: String, reason: String },

    #[error("failed to acknowledge delivery {tag} on queue '{queue}': {reason}")]
    Ack {
        queue: String,
        tag: DeliveryTag,
        reason: String,
    },

    #[error("the broker closed the consumer on queue '{queue}'")]
    ConsumerClosed { queue: String },

    #[error("failed to close the broker connection: {0}")]
    Close(String),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Infrastructure
    }
}

/// Invalid configuration, detected before any connection is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid broker url '{url}': {reason}")]
    InvalidBrokerUrl { url: String, reason: String },

    #[error("queue name must not be empty")]
    EmptyQueueName,

    #[error("invalid phone number '{0}': expected E.164 format such as +15551234567")]
    InvalidPhoneNumber(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("unknown {name} '{value}' (expected one of: {expected})")]
    UnknownVariant {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid carrier account sid '{0}': expected letters and digits only")]
    InvalidAccountSid(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Top-level error of a pipeline run. Anything that reaches this type ends the
/// process with [`PipelineError::exit_code`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("authentication with the activity source failed: {0}")]
    Auth(SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Queue(err) => err.kind(),
            PipelineError::Auth(_) | PipelineError::Config(_) => ErrorKind::Permanent,
        }
    }

    pub fn exit_code(&self) -> u8 {
        1
    }
}
