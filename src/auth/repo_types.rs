use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Value side of `users.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub password_hash: String, // hex SHA-256
}

/// Whole `users.json` document, keyed by username.
pub type CredentialFile = BTreeMap<String, StoredCredential>;

/// User row of the Postgres backend.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub username: String,
    pub password_hash: String,
}
