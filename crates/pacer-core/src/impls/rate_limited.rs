//! RateLimitedSource - 取得元への最小間隔の強制
//!
//! 取得元は短い間隔の連続アクセスを "Forbidden" で弾くので、fetch の開始同士が
//! `effective_interval` 以上空くようにする。結果（新着 / 変化なし / エラー）に関係なく
//! 毎回 1 回分として数える。最初の 1 回は待たない。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::domain::{ActivityRecord, Session, SourceError};
use crate::ports::ActivityQuerySource;

/// Enforces a minimum spacing between consecutive acquisitions.
#[derive(Debug, Clone)]
pub struct MinIntervalLimiter {
    inner: Arc<Mutex<LimiterInner>>,
}

#[derive(Debug)]
struct LimiterInner {
    interval: Duration,
    last: Option<Instant>,
}

impl MinIntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LimiterInner {
                interval,
                last: None,
            })),
        }
    }

    /// Wait until `interval` has passed since the previous acquisition.
    ///
    /// The lock is held across the sleep so concurrent callers queue up
    /// instead of all waking at once.
    pub async fn acquire(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(last) = inner.last {
            tokio::time::sleep_until(last + inner.interval).await;
        }
        inner.last = Some(Instant::now());
    }
}

/// Wraps any [`ActivityQuerySource`] so that every fetch first passes the limiter.
pub struct RateLimitedSource<S> {
    source: S,
    limiter: MinIntervalLimiter,
}

impl<S> RateLimitedSource<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            limiter: MinIntervalLimiter::new(interval),
        }
    }

    pub fn inner(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: ActivityQuerySource> ActivityQuerySource for RateLimitedSource<S> {
    async fn fetch_latest(&self, session: &Session) -> Result<Option<ActivityRecord>, SourceError> {
        self.limiter.acquire().await;
        self.source.fetch_latest(session).await
    }
}
