//! AlertMessage - キューに流す通知本文
//!
//! 本文は publish 前に完全に整形済み。キューにはテンプレートや部分データは流さない。
//! `id` と `created_at` はブローカーのメッセージプロパティとしてのみ運ばれ、
//! body は plain text のまま。

use chrono::{DateTime, Utc};

use super::{ActivityRecord, AlertId};

/// Divisor used to turn the source's meters into displayed miles.
pub const METERS_PER_MILE: f64 = 1609.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    id: AlertId,
    created_at: DateTime<Utc>,
    text: String,
}

impl AlertMessage {
    /// Format the alert for a newly detected activity.
    pub fn for_activity(record: &ActivityRecord) -> Self {
        Self::from_text(format_alert_text(record))
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            id: AlertId::generate(),
            created_at: Utc::now(),
            text: text.into(),
        }
    }

    pub fn id(&self) -> AlertId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Wire body: the UTF-8 text, nothing else.
    pub fn body(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// Deterministic alert text for an activity.
pub fn format_alert_text(record: &ActivityRecord) -> String {
    format!(
        "{} just completed a {} activity. They went {} miles in {} minutes.",
        record.owner_name,
        record.activity_type,
        display_decimal(distance_miles(record.distance_meters)),
        duration_minutes(record.duration_secs),
    )
}

/// Meters to miles, rounded to 2 decimal places, ties to even.
pub fn distance_miles(meters: f64) -> f64 {
    (meters / METERS_PER_MILE * 100.0).round_ties_even() / 100.0
}

/// Seconds to whole minutes, ties to even.
pub fn duration_minutes(secs: f64) -> i64 {
    (secs / 60.0).round_ties_even() as i64
}

// Always shows at least one decimal place: 2 -> "2.0", 3.14 -> "3.14".
fn display_decimal(value: f64) -> String {
    let s = value.to_string();
    if s.contains('.') || !value.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActivityId;
    use rstest::rstest;

    fn record(distance_meters: f64, duration_secs: f64) -> ActivityRecord {
        ActivityRecord {
            id: ActivityId::from(250),
            activity_type: "running".to_string(),
            distance_meters,
            duration_secs,
            owner_name: "Alice".to_string(),
        }
    }

    #[test]
    fn formats_the_reference_activity() {
        let text = format_alert_text(&record(3218.0, 1800.0));
        assert_eq!(
            text,
            "Alice just completed a running activity. They went 2.0 miles in 30 minutes."
        );
    }

    #[rstest]
    #[case(3218.0, "2.0")]
    #[case(5052.26, "3.14")]
    #[case(804.5, "0.5")]
    #[case(0.0, "0.0")]
    #[case(42195.0, "26.22")]
    #[case(201.125, "0.12")]
    #[case(1005.625, "0.62")]
    fn miles_are_rounded_to_two_places(#[case] meters: f64, #[case] expected: &str) {
        assert_eq!(display_decimal(distance_miles(meters)), expected);
    }

    #[rstest]
    #[case(1800.0, 30)]
    #[case(1829.0, 30)]
    #[case(1831.0, 31)]
    #[case(90.0, 2)]
    #[case(150.0, 2)]
    #[case(0.0, 0)]
    fn minutes_round_half_to_even(#[case] secs: f64, #[case] expected: i64) {
        assert_eq!(duration_minutes(secs), expected);
    }

    #[test]
    fn body_is_plain_text() {
        let alert = AlertMessage::for_activity(&record(3218.0, 1800.0));
        assert_eq!(alert.body(), alert.text().as_bytes());
        assert!(alert.id().to_string().starts_with("alert-"));
    }
}
