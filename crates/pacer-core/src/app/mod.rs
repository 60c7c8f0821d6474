//! App - アプリケーション層
//!
//! ports を組み合わせて 2 つのループを実装します。
//!
//! # 主要コンポーネント
//! - **LoopBuilder**: ループの構築とワイヤリング（fail-fast）
//! - **PollLoop**: 取得 → dedup → 整形 → publish（producer）
//! - **DeliveryLoop**: receive → decode → ack → send（consumer）
//! - **Shutdown**: watch channel による停止合図
//! - **Status**: 集計と終了ステータス

pub mod builder;
pub mod delivery_loop;
pub mod poll_loop;
pub mod shutdown;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, LoopBuilder};
pub use self::delivery_loop::{DeliveryLoop, Processed};
pub use self::poll_loop::{PollLoop, TickOutcome};
pub use self::shutdown::{Shutdown, ShutdownSignal};
pub use self::status::{DeliveryStats, ExitStatus, PollStats};
