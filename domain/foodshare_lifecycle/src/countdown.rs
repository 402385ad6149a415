//! Expiry countdown shown on donation cards.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Remaining time below which a donation is flagged as critical.
pub const DEFAULT_CRITICAL_MINUTES: i64 = 120;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Critical,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Countdown {
    pub remaining: Duration,
    pub urgency: Urgency,
}

impl Countdown {
    pub fn until(expiry: DateTime<Utc>, now: DateTime<Utc>, critical: Duration) -> Self {
        let remaining = expiry - now;
        let urgency = if remaining <= Duration::zero() {
            Urgency::Expired
        } else if remaining <= critical {
            Urgency::Critical
        } else {
            Urgency::Normal
        };
        Self {
            remaining: remaining.max(Duration::zero()),
            urgency,
        }
    }

    pub fn label(&self) -> String {
        if self.urgency == Urgency::Expired {
            return "Expired".to_string();
        }
        let minutes = self.remaining.num_minutes();
        let (days, hours, mins) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);
        if days > 0 {
            format!("{days}d {hours}h left")
        } else if hours > 0 {
            format!("{hours}h {mins:02}m left")
        } else {
            format!("{mins}m left")
        }
    }
}

impl Serialize for Countdown {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Countdown", 3)?;
        s.serialize_field("remaining_secs", &self.remaining.num_seconds())?;
        s.serialize_field("urgency", &self.urgency)?;
        s.serialize_field("label", &self.label())?;
        s.end()
    }
}
