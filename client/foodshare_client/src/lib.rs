//! FoodShare client: talks to the FoodShare REST API on behalf of one
//! signed-in user.
//!
//! * [`api`]: typed HTTP client with an explicit [`session`].
//! * [`actions`]: claim / cancel / verify-pickup / confirm-delivery handlers.
//! * [`pickup`]: pickup-code entry with auto-submit and shake reset.
//! * [`tracker`]: background re-fetch loop that reports lifecycle changes.
//! * [`server`]: local read API for a UI shell.
//! * [`db`]: SQLite state: remembered token, notifications, tracker stages.

pub mod actions;
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod notifications;
pub mod pickup;
pub mod server;
pub mod session;
pub mod tracker;

#[cfg(test)]
mod mock_backend;
#[cfg(test)]
mod test_http;
