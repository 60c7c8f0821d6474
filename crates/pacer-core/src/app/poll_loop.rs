//! PollLoop - 最新アクティビティの監視と alert の publish（producer）
//!
//! # フロー（1 tick）
//! 1. session を確保（なければ SessionProvider から）
//! 2. 最新アクティビティを取得（RateLimitedSource 経由。間隔制御はここではしない）
//! 3. `last_seen` と比較し、遷移なら alert を整形して publish
//! 4. publish 成功後にだけ `last_seen` を更新
//!
//! # 失敗の扱い
//! - Transient / RateLimited: WARN を出して次の tick へ（`last_seen` は触らない）
//! - Auth: [`AuthFailurePolicy`] に従う（Exit なら fatal、Wait なら新しい session を待つ）
//! - publish 失敗: 未配送の本文を ERROR で出して fatal

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::shutdown::ShutdownSignal;
use super::status::PollStats;
use crate::config::{AuthFailurePolicy, FirstPollPolicy, PollConfig};
use crate::domain::{ActivityId, AlertMessage, PipelineError, PollState, Session, SourceError};
use crate::impls::RateLimitedSource;
use crate::ports::{ActivityQuerySource, AlertPublisher, SessionProvider};

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Latest activity equals `last_seen`.
    Unchanged,
    /// First observation recorded without an alert ([`FirstPollPolicy::Baseline`]).
    Baselined { activity: ActivityId },
    Published {
        activity: ActivityId,
        alert: AlertMessage,
    },
    /// The account has no activities at all.
    NoActivity,
    /// Fetch failed transiently or was rate limited.
    SourceUnavailable,
    /// The session provider failed transiently; the source was not queried.
    SessionUnavailable,
    /// Waiting for a session other than the rejected one.
    AwaitingReauth,
}

impl TickOutcome {
    /// Whether the activity source was actually queried during the tick.
    fn reached_source(&self) -> bool {
        !matches!(
            self,
            TickOutcome::SessionUnavailable | TickOutcome::AwaitingReauth
        )
    }
}

pub struct PollLoop {
    source: Box<dyn ActivityQuerySource>,
    sessions: Box<dyn SessionProvider>,
    publisher: Box<dyn AlertPublisher>,
    config: PollConfig,
    state: PollState,
    session: Option<Session>,
    /// Last session the source rejected; never handed to the source again.
    rejected: Option<Session>,
    stats: PollStats,
}

impl PollLoop {
    /// The source is wrapped in a limiter enforcing
    /// [`PollConfig::effective_interval`] between fetches.
    pub fn new(
        source: Box<dyn ActivityQuerySource>,
        sessions: Box<dyn SessionProvider>,
        publisher: Box<dyn AlertPublisher>,
        config: PollConfig,
    ) -> Self {
        let limited = RateLimitedSource::new(source, config.effective_interval());
        Self {
            source: Box::new(limited),
            sessions,
            publisher,
            config,
            state: PollState::new(),
            session: None,
            rejected: None,
            stats: PollStats::default(),
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// Run one poll. `Err` is always fatal for the producer.
    pub async fn tick(&mut self) -> Result<TickOutcome, PipelineError> {
        self.stats.ticks += 1;

        let session = match self.session.clone() {
            Some(session) => session,
            None => match self.sessions.establish().await {
                Ok(session) if self.rejected.as_ref() == Some(&session) => {
                    error!("session provider still returns the rejected session; waiting for re-authentication");
                    return Ok(TickOutcome::AwaitingReauth);
                }
                Ok(session) => {
                    self.rejected = None;
                    self.session = Some(session.clone());
                    session
                }
                Err(err @ SourceError::Auth(_)) => return self.auth_failed(err),
                Err(err) => {
                    warn!(error = %err, "could not establish a session; retrying next tick");
                    self.stats.source_errors += 1;
                    return Ok(TickOutcome::SessionUnavailable);
                }
            },
        };

        let record = match self.source.fetch_latest(&session).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("activity source reports no activities");
                return Ok(TickOutcome::NoActivity);
            }
            Err(err @ SourceError::Auth(_)) => return self.auth_failed(err),
            Err(err) => {
                warn!(error = %err, "activity fetch failed; retrying next tick");
                self.stats.source_errors += 1;
                return Ok(TickOutcome::SourceUnavailable);
            }
        };

        if !self.state.is_transition(&record.id) {
            debug!(activity_id = %record.id, "no new activity");
            self.stats.unchanged += 1;
            return Ok(TickOutcome::Unchanged);
        }

        if self.state.is_first_observation() && self.config.first_poll == FirstPollPolicy::Baseline {
            info!(activity_id = %record.id, "baseline activity recorded");
            self.state.record(record.id.clone());
            return Ok(TickOutcome::Baselined { activity: record.id });
        }

        let alert = AlertMessage::for_activity(&record);
        self.publish(&alert).await?;
        self.state.record(record.id.clone());
        self.stats.alerts_published += 1;
        info!(
            activity_id = %record.id,
            alert_id = %alert.id(),
            queue = self.publisher.queue(),
            text = alert.text(),
            "alert published"
        );

        Ok(TickOutcome::Published {
            activity: record.id,
            alert,
        })
    }

    async fn publish(&mut self, alert: &AlertMessage) -> Result<(), PipelineError> {
        let published = match self.publisher.ensure_queue().await {
            Ok(()) => self.publisher.publish(alert).await,
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            error!(
                queue = self.publisher.queue(),
                alert_id = %alert.id(),
                text = alert.text(),
                error = %err,
                "alert could not be published and was not delivered"
            );
            return Err(err.into());
        }
        Ok(())
    }

    fn auth_failed(&mut self, err: SourceError) -> Result<TickOutcome, PipelineError> {
        self.stats.auth_failures += 1;
        match self.config.on_auth_failure {
            AuthFailurePolicy::Exit => Err(PipelineError::Auth(err)),
            AuthFailurePolicy::Wait => {
                error!(error = %err, "activity source rejected the session; waiting for a new one");
                if let Some(rejected) = self.session.take() {
                    self.rejected = Some(rejected);
                }
                Ok(TickOutcome::AwaitingReauth)
            }
        }
    }

    /// Poll until shutdown or a fatal error, then close the broker connection.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> Result<PollStats, PipelineError> {
        info!(
            queue = self.publisher.queue(),
            interval_secs = self.config.effective_interval().as_secs(),
            "poll loop started"
        );

        let result = self.poll_until_shutdown(&mut shutdown).await;

        if let Err(err) = self.publisher.close().await {
            warn!(error = %err, "failed to close broker connection");
        }
        match &result {
            Ok(()) => info!(stats = ?self.stats, "poll loop stopped"),
            Err(err) => error!(error = %err, stats = ?self.stats, "poll loop failed"),
        }
        result.map(|()| self.stats)
    }

    async fn poll_until_shutdown(&mut self, shutdown: &mut ShutdownSignal) -> Result<(), PipelineError> {
        let idle = self.config.effective_interval();
        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => return Ok(()),
                outcome = self.tick() => outcome?,
            };

            // The limiter only paces fetches; ticks that never reached the
            // source wait out the interval here instead.
            if !outcome.reached_source() {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => return Ok(()),
                    _ = sleep(idle) => {}
                }
            }
        }
    }
}
