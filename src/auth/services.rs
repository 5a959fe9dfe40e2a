use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    password::{hash_password, verify_password},
    repo::CredentialStore,
};
use crate::error::StoreError;

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^\S{1,64}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Registration and login on top of a [`CredentialStore`].
#[derive(Clone)]
pub struct AuthManager {
    store: Arc<dyn CredentialStore>,
}

impl AuthManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// `false` when either field is empty or the username is taken.
    pub async fn register(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        if username.is_empty() || password.is_empty() {
            return Ok(false);
        }
        let created = self
            .store
            .insert(username, &hash_password(password))
            .await?;
        if created {
            info!(%username, "user registered");
        } else {
            warn!(%username, "username already exists");
        }
        Ok(created)
    }

    /// The username itself on success.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<String>, StoreError> {
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }
        let Some(hash) = self.store.password_hash(username).await? else {
            warn!(%username, "login unknown user");
            return Ok(None);
        };
        if !verify_password(password, &hash) {
            warn!(%username, "login invalid password");
            return Ok(None);
        }
        Ok(Some(username.to_string()))
    }
}
