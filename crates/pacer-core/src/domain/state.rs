//! State - ループが保持する状態
//!
//! - [`PollState`]: Poll Loop だけが所有する `last_seen`（プロセス内のみ、永続化しない）
//! - [`DeliveryPhase`]: Delivery Loop の 1 メッセージ処理の状態遷移

use super::ActivityId;

/// Dedup state of the poll loop: the last activity id that was announced
/// (or baselined).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    last_seen: Option<ActivityId>,
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self) -> Option<&ActivityId> {
        self.last_seen.as_ref()
    }

    /// Nothing has been recorded yet (fresh process).
    pub fn is_first_observation(&self) -> bool {
        self.last_seen.is_none()
    }

    /// `true` when `id` differs from the recorded id (or nothing is recorded).
    pub fn is_transition(&self, id: &ActivityId) -> bool {
        self.last_seen.as_ref() != Some(id)
    }

    pub fn record(&mut self, id: ActivityId) {
        self.last_seen = Some(id);
    }
}

/// DeliveryPhase は 1 メッセージ処理の状態
///
/// # 状態遷移
/// Idle → Decoding → Acknowledged → Dispatching → Idle
///
/// decode に失敗した場合も ack はするので Acknowledged を経由して Idle に戻る。
/// retry 状態は存在しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPhase {
    Idle,
    Decoding,
    Acknowledged,
    Dispatching,
}
