//! Test doubles for the ports.
//!
//! Every fake is a cheap `Clone` handle over shared state, so a test can move
//! one copy into a loop and keep another to inspect afterwards.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{
    ActivityId, ActivityRecord, MessageId, PhoneNumber, SendError, Session, SourceError,
};
use crate::impls::InMemoryBroker;
use crate::ports::{ActivityQuerySource, NotifierSink, SessionProvider};

/// The reference activity: 3218 m in 1800 s, running, owned by Alice.
pub fn run_record(id: u64) -> ActivityRecord {
    ActivityRecord {
        id: ActivityId::from(id),
        activity_type: "running".to_string(),
        distance_meters: 3218.0,
        duration_secs: 1800.0,
        owner_name: "Alice".to_string(),
    }
}

pub fn session(token: &str) -> Session {
    Session::new(json!({ "access_token": token }))
}

pub fn destination() -> PhoneNumber {
    PhoneNumber::parse("+15551234567").unwrap()
}

type FetchResult = Result<Option<ActivityRecord>, SourceError>;

/// Replays a fixed list of fetch results; once exhausted it reports a
/// transient failure forever.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<FetchResult>>>,
    seen: Arc<Mutex<Vec<Session>>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<FetchResult>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            seen: Arc::default(),
        }
    }

    /// Shorthand for a script of successful fetches.
    pub fn ids(ids: &[u64]) -> Self {
        Self::new(ids.iter().map(|&id| Ok(Some(run_record(id)))).collect())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Sessions passed to each fetch, in order.
    pub fn sessions_seen(&self) -> Vec<Session> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivityQuerySource for ScriptedSource {
    async fn fetch_latest(&self, session: &Session) -> FetchResult {
        self.seen.lock().unwrap().push(session.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Transient("script exhausted".to_string())))
    }
}

/// Hands out scripted sessions; the last entry repeats forever.
#[derive(Clone)]
pub struct StaticSessions {
    script: Arc<Mutex<VecDeque<Result<Session, SourceError>>>>,
    calls: Arc<Mutex<usize>>,
}

impl StaticSessions {
    pub fn new(script: Vec<Result<Session, SourceError>>) -> Self {
        assert!(!script.is_empty(), "session script must not be empty");
        Self {
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::default(),
        }
    }

    pub fn token(token: &str) -> Self {
        Self::new(vec![Ok(session(token))])
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn establish(&self) -> Result<Session, SourceError> {
        *self.calls.lock().unwrap() += 1;
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

/// What the notifier observed when `send` was called.
#[derive(Debug, Clone, PartialEq)]
pub struct SentText {
    pub to: PhoneNumber,
    pub text: String,
    /// Unacked deliveries on the probed queue at send time.
    pub unacked_at_send: Option<usize>,
}

/// Records every send. Scripted failures are consumed first.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentText>>>,
    failures: Arc<Mutex<VecDeque<SendError>>>,
    probe: Option<(InMemoryBroker, String)>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(errors: Vec<SendError>) -> Self {
        Self {
            failures: Arc::new(Mutex::new(errors.into())),
            ..Self::default()
        }
    }

    /// Capture the broker's unacked count for `queue` on every send.
    pub fn probing(mut self, broker: &InMemoryBroker, queue: &str) -> Self {
        self.probe = Some((broker.clone(), queue.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<SentText> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.text).collect()
    }
}

#[async_trait]
impl NotifierSink for RecordingNotifier {
    async fn send(&self, to: &PhoneNumber, text: &str) -> Result<MessageId, SendError> {
        let unacked_at_send = match &self.probe {
            Some((broker, queue)) => Some(broker.unacked_count(queue).await),
            None => None,
        };
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentText {
            to: to.clone(),
            text: text.to_string(),
            unacked_at_send,
        });
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(MessageId::new(format!("SM{}", sent.len())))
    }
}
