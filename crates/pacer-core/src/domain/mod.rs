//! Domain model (IDs, activity records, alerts, queue envelopes, state, errors).
//!
//! - activity: 取得元から読んだ最新アクティビティ
//! - alert: キューに流す整形済み通知（AlertMessage）
//! - envelope: ブローカーからの配送単位（QueueMessage）
//! - state: PollState / DeliveryPhase
//! - session: activity source 用の不透明なセッション
//! - errors: 境界ごとのエラー型と ErrorKind

pub mod activity;
pub mod alert;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod session;
pub mod state;

pub use activity::ActivityRecord;
pub use alert::{AlertMessage, format_alert_text};
pub use envelope::QueueMessage;
pub use errors::{ConfigError, ErrorKind, PipelineError, QueueError, SendError, SourceError};
pub use ids::{ActivityId, AlertId, DeliveryTag, MessageId, PhoneNumber};
pub use session::Session;
pub use state::{DeliveryPhase, PollState};
