//! Editor access gate

use thiserror::Error;
use tracing::debug;

use crate::constants::auth::TOKEN_ENV;

pub trait Authenticator {
    fn is_authenticated(&self) -> bool;
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("editing requires an access token; set {} and try again", TOKEN_ENV)]
pub struct NotAuthenticated;

/// Refuse to continue unless `auth` reports a session
pub fn require(auth: &dyn Authenticator) -> Result<(), NotAuthenticated> {
    if auth.is_authenticated() {
        Ok(())
    } else {
        Err(NotAuthenticated)
    }
}

/// Bearer token taken from the environment
#[derive(Debug, Clone, Default)]
pub struct TokenAuth {
    token: Option<String>,
}

impl TokenAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn from_env() -> Self {
        let auth = Self::new(std::env::var(TOKEN_ENV).ok());
        debug!(variable = TOKEN_ENV, present = auth.token.is_some(), "Read access token");
        auth
    }

    /// Token to attach to authenticated requests
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl Authenticator for TokenAuth {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}
