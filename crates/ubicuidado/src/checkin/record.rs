//! Check-in records and relative time labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fix::Coordinates;

const MS_PER_DAY: i64 = 86_400_000;
const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_MINUTE: i64 = 60_000;

/// A user-submitted note tied to a captured position.
///
/// Field names are persisted in camelCase. The Spanish field names written
/// by earlier versions of the web client are accepted on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecord {
    /// Unique id, the creation time in epoch milliseconds.
    pub id: String,

    /// Who checked in.
    #[serde(alias = "nombre")]
    pub display_name: String,

    /// The note left with the check-in.
    #[serde(alias = "comentario")]
    pub comment: String,

    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// When the check-in was created.
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl CheckinRecord {
    /// The position of this check-in.
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// A link that opens this position in a web map.
    #[must_use]
    pub fn map_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }

    /// How long ago this check-in was created, relative to `now`.
    #[must_use]
    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        time_ago(self.created_at, now)
    }
}

/// Describe the time elapsed between `created_at` and `now`.
///
/// Picks the coarsest unit with a positive magnitude (days, then hours, then
/// minutes) using floor division; anything under a minute, or a `now` before
/// `created_at`, is "just now".
#[must_use]
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed_ms = (now - created_at).num_milliseconds();

    let days = elapsed_ms / MS_PER_DAY;
    let hours = elapsed_ms / MS_PER_HOUR;
    let minutes = elapsed_ms / MS_PER_MINUTE;

    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else if minutes > 0 {
        plural(minutes, "minute")
    } else {
        "just now".to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}
