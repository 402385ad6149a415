//! # FoodShare lifecycle
//!
//! Read-side model of a FoodShare donation as the API reports it, and the
//! display state derived from it.
//!
//! | Concern            | Module                                   |
//! |--------------------|------------------------------------------|
//! | Records            | [`types`], [`status`]                    |
//! | State machine      | [`lifecycle`]                            |
//! | Badge mapping      | [`badge`]                                |
//! | Progress display   | [`timeline`], [`countdown`]              |
//! | Wire envelopes     | [`envelope`]                             |
//! | Pickup credentials | [`pickup_code`]                          |
//! | Form checks        | [`validation`]                           |
//!
//! Nothing here performs I/O. The backend owns every transition; this crate
//! only interprets what it returned.

pub mod badge;
pub mod countdown;
pub mod envelope;
pub mod lifecycle;
pub mod pickup_code;
pub mod status;
pub mod timeline;
pub mod types;
pub mod validation;


pub use badge::{badge_for, Icon, StatusBadge, Tone};
pub use countdown::{Countdown, Urgency};
pub use envelope::{decode_envelope, decode_page, Envelope, EnvelopeError, ErrorBody, Page};
pub use lifecycle::{Lifecycle, LifecycleAction, Stage, TransitionError};
pub use pickup_code::{PickupCode, PickupCodeError, PICKUP_CODE_LEN};
pub use status::{ClaimStatus, DonationStatus};
pub use timeline::{Checkpoint, CheckpointState, Step, Timeline};
pub use types::{Claim, ClaimId, Coordinates, Donation, DonationId, Role, UserId, UserProfile, UserRef};
pub use validation::{FieldErrors, NewDonation};
