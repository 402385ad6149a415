//! The signed-in session, threaded explicitly into the API client.

use std::sync::Arc;

use foodshare_lifecycle::UserProfile;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::db::{self, AUTH_TOKEN_KEY};
use crate::errors::Result;

/// Where the token lives between runs ("remember me").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Written to the local state store.
    Remembered,
    /// Memory only; gone when the process exits.
    Ephemeral,
}

#[derive(Debug)]
pub struct Session {
    token: Option<String>,
    user: Option<UserProfile>,
    persistence: Persistence,
    store: Option<SqlitePool>,
}

pub type SessionHandle = Arc<RwLock<Session>>;

impl Session {
    /// A signed-out session with no backing store.
    pub fn anonymous() -> Self {
        Self {
            token: None,
            user: None,
            persistence: Persistence::Ephemeral,
            store: None,
        }
    }

    /// In-memory session for an already known token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::anonymous()
        }
    }

    /// Load a remembered token from `store`, if any.
    pub async fn restore(store: SqlitePool) -> Result<Self> {
        let token = db::get_state(&store, AUTH_TOKEN_KEY).await?;
        debug!(remembered = token.is_some(), "Session restored");
        Ok(Self {
            persistence: if token.is_some() {
                Persistence::Remembered
            } else {
                Persistence::Ephemeral
            },
            token,
            user: None,
            store: Some(store),
        })
    }

    pub fn into_handle(self) -> SessionHandle {
        Arc::new(RwLock::new(self))
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn set_user(&mut self, user: UserProfile) {
        self.user = Some(user);
    }

    /// Start a session. A remembered token is written through to the store;
    /// an ephemeral one also removes any previously remembered token.
    pub async fn sign_in(
        &mut self,
        token: String,
        user: Option<UserProfile>,
        persistence: Persistence,
    ) -> Result<()> {
        if let Some(store) = &self.store {
            match persistence {
                Persistence::Remembered => db::set_state(store, AUTH_TOKEN_KEY, &token).await?,
                Persistence::Ephemeral => db::delete_state(store, AUTH_TOKEN_KEY).await?,
            }
        } else if persistence == Persistence::Remembered {
            warn!("No state store attached; remembered session will not survive restart");
        }
        self.token = Some(token);
        self.user = user;
        self.persistence = persistence;
        Ok(())
    }

    /// Forget the token everywhere. Store failures are logged only.
    pub async fn clear(&mut self) {
        self.token = None;
        self.user = None;
        if let Some(store) = &self.store {
            if let Err(e) = db::delete_state(store, AUTH_TOKEN_KEY).await {
                warn!("Failed to remove remembered token: {e}");
            }
        }
    }
}
