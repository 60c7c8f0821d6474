//! Status - ループごとの集計と終了ステータス
//!
//! 集計値は停止時に構造化ログとして 1 回出力する（`--log-json` なら JSON）。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStats {
    pub ticks: u64,
    pub alerts_published: u64,
    pub unchanged: u64,
    pub source_errors: u64,
    pub auth_failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub received: u64,
    pub acked: u64,
    pub dispatched: u64,
    pub send_failures: u64,
    pub undecodable: u64,
    /// Deliveries that arrived without persistent delivery mode.
    pub non_durable: u64,
}

/// How a loop ended, as seen by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Operator-initiated shutdown (Ctrl-C / SIGINT).
    Shutdown,
    /// Unrecoverable connection, protocol, auth, publish or config error.
    Fatal,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Shutdown => 0,
            ExitStatus::Fatal => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ExitStatus::Shutdown.code(), 0);
        assert_eq!(ExitStatus::Fatal.code(), 1);
    }

    #[test]
    fn stats_serialize_flat() {
        let stats = DeliveryStats {
            received: 2,
            acked: 2,
            dispatched: 1,
            send_failures: 0,
            undecodable: 1,
            non_durable: 0,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["undecodable"], 1);
        assert_eq!(json["dispatched"], 1);
    }
}
