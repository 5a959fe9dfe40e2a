use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{CredentialFile, StoredCredential, UserRow};
use crate::{error::StoreError, storage::JsonDocument};

/// Username -> password hash mapping.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores the user unless the username is taken. Returns whether it was inserted.
    async fn insert(&self, username: &str, password_hash: &str) -> Result<bool, StoreError>;

    async fn password_hash(&self, username: &str) -> Result<Option<String>, StoreError>;
}

/// `users.json` backend.
pub struct FileCredentialStore {
    doc: JsonDocument,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<bool, StoreError> {
        let _guard = self.doc.lock().await;
        let mut users: CredentialFile = self.doc.load().await?;
        if users.contains_key(username) {
            return Ok(false);
        }
        users.insert(
            username.to_string(),
            StoredCredential {
                password_hash: password_hash.to_string(),
            },
        );
        self.doc.save(&users).await?;
        Ok(true)
    }

    async fn password_hash(&self, username: &str) -> Result<Option<String>, StoreError> {
        let users: CredentialFile = self.doc.load().await?;
        Ok(users.get(username).map(|c| c.password_hash.clone()))
    }
}

pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<bool, StoreError> {
        let done = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn password_hash(&self, username: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT username, password_hash
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|r| r.password_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_is_unique_per_username() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("users.json"));

        assert!(store.insert("ana", "h1").await.unwrap());
        assert!(!store.insert("ana", "h2").await.unwrap());
        assert_eq!(store.password_hash("ana").await.unwrap().as_deref(), Some("h1"));
        assert_eq!(store.password_hash("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_layout_is_username_to_hash_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let store = FileCredentialStore::new(&path);
        store.insert("ana", "abc123").await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["ana"]["password_hash"], "abc123");
        assert_eq!(parsed.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"{"legacy": {"password_hash": "ff"}}"#).unwrap();
        let store = FileCredentialStore::new(&path);
        assert_eq!(store.password_hash("legacy").await.unwrap().as_deref(), Some("ff"));
    }
}
