//! DeliveryQueue port - durable queue（RabbitMQ または InMemory）
//!
//! Producer 側は [`AlertPublisher`]、Consumer 側は [`AlertSubscription`]。
//! どちらも 1 本の接続を専有し、ループの生存期間中は共有しない。
//!
//! # 実装
//! - `impls::amqp`: AmqpPublisher / AmqpSubscriber（本番用）
//! - `impls::inmem_broker`: InMemoryBroker（開発・テスト用）

use async_trait::async_trait;

use crate::domain::{AlertMessage, DeliveryTag, QueueError, QueueMessage};

/// Producer side of the durable queue.
///
/// # 設計原則
/// - `ensure_queue` は冪等（毎回呼んでよい）
/// - `publish` は persistent delivery mode。broker が受理しなければ Err
#[async_trait]
pub trait AlertPublisher: Send {
    fn queue(&self) -> &str;

    /// Declare the durable queue if it does not exist yet.
    async fn ensure_queue(&mut self) -> Result<(), QueueError>;

    async fn publish(&mut self, alert: &AlertMessage) -> Result<(), QueueError>;

    async fn close(&mut self) -> Result<(), QueueError>;
}

/// Consumer side of the durable queue, with explicit acknowledgment.
///
/// # 設計原則
/// - `subscribe` は queue を宣言してから explicit ack で購読を開始する（auto-ack しない）
/// - `next` は配送が来るまで無期限に待つ。`Ok(None)` は broker がストリームを閉じたこと
/// - `next` は cancel-safe（shutdown との `select!` で落とされても配送を失わない）
#[async_trait]
pub trait AlertSubscription: Send {
    fn queue(&self) -> &str;

    async fn subscribe(&mut self) -> Result<(), QueueError>;

    async fn next(&mut self) -> Result<Option<QueueMessage>, QueueError>;

    async fn ack(&mut self, tag: DeliveryTag) -> Result<(), QueueError>;

    async fn close(&mut self) -> Result<(), QueueError>;
}
