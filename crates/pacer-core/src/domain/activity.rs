use serde::{Deserialize, Serialize};

use super::ActivityId;

/// The most recent activity as reported by the activity source.
///
/// Produced fresh on every poll and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: ActivityId,

    /// Provider's activity type key, e.g. `running`, `cycling`.
    pub activity_type: String,

    /// Distance in meters (0.0 for activities without distance).
    pub distance_meters: f64,

    /// Elapsed duration in seconds.
    pub duration_secs: f64,

    /// Display name of the account owner.
    pub owner_name: String,
}
