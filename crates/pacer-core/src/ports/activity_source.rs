//! ActivityQuerySource port - 最新アクティビティの取得
//!
//! 取得元（Garmin Connect 互換 API など）への HTTP 呼び出しはここに隠蔽します。
//! セッションの確立は別 port（[`SessionProvider`]）に分離。
//!
//! # 設計原則
//! - 失敗は [`SourceError`] の 3 分類（Auth / RateLimited / Transient）で返す
//! - rate limit の間隔制御は呼び出し側ではなくラッパー（`RateLimitedSource`）が担う

use async_trait::async_trait;

use crate::domain::{ActivityRecord, Session, SourceError};

/// Returns the most recent activity for the session's account.
#[async_trait]
pub trait ActivityQuerySource: Send + Sync {
    /// `Ok(None)` means the account has no activities at all.
    async fn fetch_latest(&self, session: &Session) -> Result<Option<ActivityRecord>, SourceError>;
}

#[async_trait]
impl<T: ActivityQuerySource + ?Sized> ActivityQuerySource for Box<T> {
    async fn fetch_latest(&self, session: &Session) -> Result<Option<ActivityRecord>, SourceError> {
        (**self).fetch_latest(session).await
    }
}

/// Yields a reusable session handle or fails with [`SourceError::Auth`].
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn establish(&self) -> Result<Session, SourceError>;
}
