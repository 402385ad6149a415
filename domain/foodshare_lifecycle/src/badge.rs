//! Status → badge mapping.

use serde::Serialize;
use tracing::warn;

use crate::lifecycle::Lifecycle;
use crate::status::normalise;

/// Colour family of a badge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Warning,
    Info,
    Accent,
    Success,
    Danger,
    Muted,
    Neutral,
}

impl Tone {
    /// `(background, text)` utility classes.
    pub fn classes(self) -> (&'static str, &'static str) {
        match self {
            Self::Warning => ("bg-yellow-100", "text-yellow-800"),
            Self::Info => ("bg-blue-100", "text-blue-800"),
            Self::Accent => ("bg-purple-100", "text-purple-800"),
            Self::Success => ("bg-green-100", "text-green-800"),
            Self::Danger => ("bg-red-100", "text-red-800"),
            Self::Muted => ("bg-gray-200", "text-gray-600"),
            Self::Neutral => ("bg-gray-100", "text-gray-800"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Clock,
    Handshake,
    Truck,
    CheckCircle,
    XCircle,
    Ban,
    HelpCircle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub label: String,
    pub tone: Tone,
    pub icon: Icon,
    /// `false` for the fallback badge.
    pub recognized: bool,
}

impl StatusBadge {
    fn fallback() -> Self {
        Self {
            label: "Unknown".to_string(),
            tone: Tone::Neutral,
            icon: Icon::HelpCircle,
            recognized: false,
        }
    }
}

fn lookup(key: &str) -> Option<(Tone, Icon)> {
    let entry = match key {
        "pending" | "available" => (Tone::Warning, Icon::Clock),
        "claimed" | "active" => (Tone::Info, Icon::Handshake),
        "picked_up" => (Tone::Accent, Icon::Truck),
        "delivered" => (Tone::Success, Icon::CheckCircle),
        "expired" => (Tone::Danger, Icon::XCircle),
        "cancelled" => (Tone::Muted, Icon::Ban),
        _ => return None,
    };
    Some(entry)
}

/// `picked_up` → `Picked up`.
fn label_for(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Map a raw status string to its badge. Unknown values get the neutral
/// fallback and one warning event.
pub fn badge_for(raw: &str) -> StatusBadge {
    let key = normalise(raw);
    match lookup(&key) {
        Some((tone, icon)) => StatusBadge {
            label: label_for(&key),
            tone,
            icon,
            recognized: true,
        },
        None => {
            warn!(status = raw, "Unrecognised donation status, using fallback badge");
            StatusBadge::fallback()
        }
    }
}

impl Lifecycle {
    pub fn badge(&self) -> StatusBadge {
        match self {
            // keep the raw value so the warning names what the API sent
            Lifecycle::Unknown { raw } => badge_for(raw),
            other => badge_for(other.stage().as_str()),
        }
    }
}
