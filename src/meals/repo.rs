use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};

use super::repo_types::{HistoryEntry, HistoryFile, HistoryRow, NewEntry};
use crate::{error::StoreError, storage::JsonDocument};

/// Per-user, append-only meal history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends under `timestamp`; the entry's date is the timestamp's day.
    async fn append(
        &self,
        user: &str,
        timestamp: String,
        entry: NewEntry,
    ) -> Result<HistoryEntry, StoreError>;

    /// Oldest first. Unknown users have an empty history.
    async fn list(&self, user: &str) -> Result<Vec<HistoryEntry>, StoreError>;
}

/// `history.json` backend.
pub struct FileHistoryStore {
    doc: JsonDocument,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
        }
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(
        &self,
        user: &str,
        timestamp: String,
        entry: NewEntry,
    ) -> Result<HistoryEntry, StoreError> {
        let entry = entry.into_entry(user, timestamp);

        let _guard = self.doc.lock().await;
        let mut history: HistoryFile = self.doc.load().await?;
        history
            .entry(user.to_string())
            .or_default()
            .push(entry.clone());
        self.doc.save(&history).await?;
        Ok(entry)
    }

    async fn list(&self, user: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut history: HistoryFile = self.doc.load().await?;
        Ok(history.remove(user).unwrap_or_default())
    }
}

pub struct PgHistoryStore {
    db: PgPool,
}

impl PgHistoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(
        &self,
        user: &str,
        timestamp: String,
        entry: NewEntry,
    ) -> Result<HistoryEntry, StoreError> {
        let entry = entry.into_entry(user, timestamp);
        sqlx::query(
            r#"
            INSERT INTO history_entries
                (username, recorded_at, day, dish_name, total_calories, total_protein,
                 total_carbs, total_fat, image_b64, ingredients)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&entry.user)
        .bind(&entry.timestamp)
        .bind(&entry.date)
        .bind(&entry.dish_name)
        .bind(entry.total_calories)
        .bind(entry.total_protein)
        .bind(entry.total_carbs)
        .bind(entry.total_fat)
        .bind(&entry.image_b64)
        .bind(Json(&entry.ingredients))
        .execute(&self.db)
        .await?;
        Ok(entry)
    }

    async fn list(&self, user: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT username, recorded_at, day, dish_name, total_calories, total_protein,
                   total_carbs, total_fat, image_b64, ingredients
            FROM history_entries
            WHERE username = $1
            ORDER BY id ASC
            "#,
        )
        .bind(user)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::repo_types::Ingredient;

    fn meal(name: &str, kcal: f64) -> NewEntry {
        NewEntry {
            dish_name: name.into(),
            total_calories: kcal,
            ingredients: vec![Ingredient {
                name: "rice".into(),
                calories: kcal,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn append_preserves_order_and_derives_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path().join("history.json"));

        store
            .append("ana", "2024-05-01 12:00:00".into(), meal("soup", 300.0))
            .await
            .unwrap();
        let second = store
            .append("ana", "2024-05-02 08:30:00".into(), meal("toast", 250.0))
            .await
            .unwrap();
        assert_eq!(second.date, "2024-05-02");
        assert_eq!(second.user, "ana");

        let all = store.list("ana").await.unwrap();
        let names: Vec<_> = all.iter().map(|e| e.dish_name.as_str()).collect();
        assert_eq!(names, ["soup", "toast"]);
        assert_eq!(all[0].ingredients[0].name, "rice");
    }

    #[tokio::test]
    async fn users_only_see_their_own_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path().join("history.json"));
        store
            .append("ana", "2024-05-01 12:00:00".into(), meal("soup", 300.0))
            .await
            .unwrap();

        assert!(store.list("bob").await.unwrap().is_empty());
        assert_eq!(store.list("ana").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tolerates_legacy_entries_with_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"{"ana": [{"date": "2024-01-01", "dish_name": "pie", "total_calories": 410}]}"#,
        )
        .unwrap();
        let store = FileHistoryStore::new(path);
        let all = store.list("ana").await.unwrap();
        assert_eq!(all[0].total_calories, 410.0);
        assert_eq!(all[0].total_fat, 0.0);
        assert!(all[0].ingredients.is_empty());
    }
}
