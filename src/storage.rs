use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::StoreError;

/// A JSON file that is always read and rewritten as a whole.
///
/// Readers see either the previous or the next full document: saves go to a
/// sibling temp file that is renamed over the target. Read-modify-write
/// sequences inside this process are serialized through [`JsonDocument::lock`].
#[derive(Debug)]
pub struct JsonDocument {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Missing or empty files load as `T::default()`.
    pub async fn load<T>(&self) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let body = to_indented_json(value)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "json document saved");
        Ok(())
    }
}

/// Four-space indented JSON, matching files written by hand or by older tools.
fn to_indented_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(dir.path().join("nothing.json"));
        let loaded: BTreeMap<String, u32> = doc.load().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn save_creates_parent_and_indents() {
        let dir = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(dir.path().join("nested").join("doc.json"));
        let mut value = BTreeMap::new();
        value.insert("alice".to_string(), 1u32);
        doc.save(&value).await.unwrap();

        let raw = std::fs::read_to_string(doc.path()).unwrap();
        assert!(raw.contains("\n    \"alice\": 1"));
        let back: BTreeMap<String, u32> = doc.load().await.unwrap();
        assert_eq!(back, value);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let doc = JsonDocument::new(path);
        let err = doc.load::<BTreeMap<String, u32>>().await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
