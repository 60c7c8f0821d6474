//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **AmqpPublisher / AmqpSubscriber**: RabbitMQ（lapin）
//! - **InMemoryBroker**: 開発・テスト用のブローカー（durable / unacked / restart を再現）
//! - **ConnectApiSource**: activity API（reqwest）
//! - **FileSessionProvider**: session cache file
//! - **RateLimitedSource**: 任意の source に最小 poll 間隔を強制するラッパー
//! - **TwilioNotifier**: SMS carrier（reqwest）

pub mod amqp;
pub mod connect_api;
mod http;
pub mod inmem_broker;
pub mod rate_limited;
pub mod session_file;
pub mod twilio;

// 主要な型を再エクスポート
pub use self::amqp::{AmqpPublisher, AmqpSubscriber};
pub use self::connect_api::ConnectApiSource;
pub use self::inmem_broker::{InMemoryBroker, InMemoryPublisher, InMemorySubscriber};
pub use self::rate_limited::{MinIntervalLimiter, RateLimitedSource};
pub use self::session_file::FileSessionProvider;
pub use self::twilio::{TwilioCredentials, TwilioNotifier};
