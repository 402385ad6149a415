//! Pickup-code entry: buffers what the donor types, auto-submits at six
//! characters, and runs the shake-and-reset cycle on a rejected code.

use std::time::Duration;

use foodshare_lifecycle::{ClaimId, DonationId, PickupCode, PICKUP_CODE_LEN};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::actions::{ActionEffects, ActionOutcome, ClaimActions, Rejection};
use crate::api::DonationApi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Editable,
    Submitting,
    /// Code refused; the input shakes and stays locked until `until`.
    Rejected { message: String, until: Instant },
}

/// What a keystroke led to.
#[derive(Debug, Clone, PartialEq)]
pub enum PickupStep {
    /// Fewer than six characters; nothing sent.
    Incomplete { len: usize },
    /// Input is locked (submitting or shaking); nothing sent.
    Locked,
    Verified { claim_id: ClaimId },
    /// Refused with 422/409; the buffer was cleared.
    Rejected { message: String },
    /// Any other failure; the buffer is kept so the donor can retry.
    Failed { message: String },
    Abandoned,
}

pub struct PickupCodeEntry {
    claim_id: ClaimId,
    donation_id: Option<DonationId>,
    buffer: String,
    state: EntryState,
    shake_reset: Duration,
}

impl PickupCodeEntry {
    pub fn new(claim_id: ClaimId, donation_id: Option<DonationId>, shake_reset: Duration) -> Self {
        Self {
            claim_id,
            donation_id,
            buffer: String::new(),
            state: EntryState::Editable,
            shake_reset,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current state; a rejection whose delay has elapsed reads as editable.
    pub fn state(&self) -> EntryState {
        match &self.state {
            EntryState::Rejected { until, .. } if Instant::now() >= *until => EntryState::Editable,
            other => other.clone(),
        }
    }

    /// Wait out the shake delay, if one is running.
    pub async fn settle(&mut self) {
        if let EntryState::Rejected { until, .. } = self.state {
            tokio::time::sleep_until(until).await;
        }
        self.state = self.state();
    }

    /// Replace the buffer with `text` (whitespace dropped, capped at six
    /// characters) and submit once it is complete.
    pub async fn input<A, E>(
        &mut self,
        text: &str,
        actions: &ClaimActions<A, E>,
        cancel: &CancellationToken,
    ) -> PickupStep
    where
        A: DonationApi + ?Sized,
        E: ActionEffects + ?Sized,
    {
        self.state = self.state();
        if self.state != EntryState::Editable {
            return PickupStep::Locked;
        }

        self.buffer = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .take(PICKUP_CODE_LEN)
            .collect();

        let len = self.buffer.chars().count();
        if len < PICKUP_CODE_LEN {
            return PickupStep::Incomplete { len };
        }

        let code = match PickupCode::parse(&self.buffer) {
            Ok(code) => code,
            Err(e) => return PickupStep::Failed { message: e.to_string() },
        };

        self.state = EntryState::Submitting;
        let outcome = actions
            .verify_pickup(self.claim_id, self.donation_id, &code, cancel)
            .await;

        match outcome {
            ActionOutcome::Success { value, .. } => {
                self.state = EntryState::Editable;
                PickupStep::Verified { claim_id: value.id }
            }
            ActionOutcome::Rejected {
                rejection: Rejection::Validation(_) | Rejection::Conflict,
                toast,
            } => {
                self.buffer.clear();
                self.state = EntryState::Rejected {
                    message: toast.body.clone(),
                    until: Instant::now() + self.shake_reset,
                };
                debug!(claim = %self.claim_id, "Pickup code rejected; input locked");
                PickupStep::Rejected {
                    message: toast.body,
                }
            }
            ActionOutcome::Rejected { toast, .. } => {
                self.state = EntryState::Editable;
                PickupStep::Failed {
                    message: toast.body,
                }
            }
            ActionOutcome::Busy => {
                self.state = EntryState::Editable;
                PickupStep::Locked
            }
            ActionOutcome::Abandoned => {
                self.state = EntryState::Editable;
                PickupStep::Abandoned
            }
        }
    }
}
