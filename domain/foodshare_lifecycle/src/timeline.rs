//! # Timeline
//!
//! Four fixed checkpoints rendered as a linear progress display:
//!
//! | Index | Step      | Timestamp source             |
//! |-------|-----------|------------------------------|
//! | 0     | Created   | `donation.created_at`        |
//! | 1     | Claimed   | `claim.created_at`           |
//! | 2     | PickedUp  | `claim.picked_up_at`         |
//! | 3     | Delivered | `claim.delivered_at`         |
//!
//! The current index comes from [`Lifecycle`]. Stages off the happy path
//! (expired, cancelled, unknown) sit at index 0, same as a fresh donation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lifecycle::{Lifecycle, Stage};
use crate::types::Donation;

pub const PENDING_LABEL: &str = "Pending";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Created,
    Claimed,
    PickedUp,
    Delivered,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Created, Step::Claimed, Step::PickedUp, Step::Delivered];

    pub fn title(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Claimed => "Claimed",
            Self::PickedUp => "Picked up",
            Self::Delivered => "Delivered",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Completed,
    Active,
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub step: Step,
    pub state: CheckpointState,
    pub at: Option<DateTime<Utc>>,
    /// RFC 3339 timestamp, or "Pending" when none is known.
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub current: usize,
    pub checkpoints: [Checkpoint; 4],
}

fn current_index(stage: Stage) -> usize {
    stage.progress().map(usize::from).unwrap_or(0)
}

impl Timeline {
    pub fn derive(donation: &Donation) -> Self {
        let stage = Lifecycle::resolve(donation).stage();
        let current = current_index(stage);
        let claim = donation.claim.as_ref();

        let timestamps = [
            donation.created_at,
            claim.and_then(|c| c.created_at),
            claim.and_then(|c| c.picked_up_at),
            claim.and_then(|c| c.delivered_at),
        ];

        let checkpoints = std::array::from_fn(|i| {
            let state = if i < current || (i == current && stage == Stage::Delivered) {
                CheckpointState::Completed
            } else if i == current {
                CheckpointState::Active
            } else {
                CheckpointState::Pending
            };
            let at = timestamps[i];
            Checkpoint {
                step: Step::ALL[i],
                state,
                at,
                label: at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| PENDING_LABEL.to_string()),
            }
        });

        Self {
            current,
            checkpoints,
        }
    }

    pub fn checkpoint(&self, step: Step) -> &Checkpoint {
        &self.checkpoints[step as usize]
    }
}
