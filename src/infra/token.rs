//! Bearer token storage.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};

use crate::domain::TokenProvider;

/// Holds the current access token in memory. Set after login, cleared on logout.
#[derive(Default)]
pub struct InMemoryTokenStore {
    token: RwLock<Option<SecretString>>,
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(token);
        store
    }

    pub fn set_token(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(SecretString::from(token.into()));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }
}

impl TokenProvider for InMemoryTokenStore {
    fn token(&self) -> Option<SecretString> {
        let slot = self.token.read().ok()?;
        slot.as_ref()
            .map(|token| SecretString::from(token.expose_secret().to_owned()))
    }
}
