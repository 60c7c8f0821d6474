//! Ports - 抽象化レイヤー
//!
//! 外部システム（activity API, SMS carrier, message broker）へのインターフェース。
//! app 層のループはこれらの trait だけに依存し、実装は `impls` が提供します。

pub mod activity_source;
pub mod delivery_queue;
pub mod notifier;

pub use self::activity_source::{ActivityQuerySource, SessionProvider};
pub use self::delivery_queue::{AlertPublisher, AlertSubscription};
pub use self::notifier::NotifierSink;
