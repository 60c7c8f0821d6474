//! pacer-core
//!
//! Core building blocks for the activity-alert pipeline.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, activity, alert, envelope, session, state, errors）
//! - **ports**: 抽象化レイヤー（ActivityQuerySource, SessionProvider, NotifierSink, AlertPublisher, AlertSubscription）
//! - **app**: アプリケーションロジック（builder, poll_loop, delivery_loop, shutdown, status）
//! - **impls**: 実装（AMQP, InMemoryBroker, HTTP adapters, rate limiter）
//! - **config**: 型付き設定（PollConfig, BrokerConfig, DeliveryConfig）
//! - **retry**: 起動時の接続リトライ（RetryPolicy）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod retry;

#[cfg(test)]
mod testing;
