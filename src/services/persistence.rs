use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

/// Atomic JSON snapshot persistence for every durable collection (C10): improvement backlog,
/// campaign history, audit schedules, lessons learned, recovery-strategy EMA table.
///
/// Reads are tolerant of absent files (start empty) and corrupt files (log, start empty,
/// never crash). Writes go to a sibling temp file and are renamed into place.
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{collection}.json"))
    }

    /// Loads `collection`, defaulting to `T::default()` if the file is absent or corrupt.
    pub async fn load<T>(&self, collection: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path_for(collection);
        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(err) => {
                    warn!(collection, path = %path.display(), %err, "corrupt persisted collection, starting empty");
                    T::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(err) => {
                warn!(collection, path = %path.display(), %err, "failed to read persisted collection, starting empty");
                T::default()
            }
        }
    }

    /// Serializes `value` and writes it atomically: write to a temp file in the same
    /// directory, then rename over the destination.
    pub async fn save<T>(&self, collection: &str, value: &T) -> std::io::Result<()>
    where
        T: Serialize,
    {
        fs::create_dir_all(&self.data_dir).await?;
        let path = self.path_for(collection);
        let tmp_path = self.data_dir.join(format!(".{collection}.{}.tmp", Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(value).expect("collections must be JSON-serializable");
        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Sample {
        items: Vec<String>,
    }

    #[tokio::test]
    async fn missing_file_loads_default() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let loaded: Sample = store.load("backlog").await;
        assert_eq!(loaded, Sample::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let value = Sample { items: vec!["a".into(), "b".into()] };
        store.save("backlog", &value).await.unwrap();
        let loaded: Sample = store.load("backlog").await;
        assert_eq!(loaded, value);
    }

    #[tokio::test]
    async fn corrupt_file_loads_default_without_panicking() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("backlog.json"), b"not json{{{").await.unwrap();
        let store = JsonStore::new(dir.path());
        let loaded: Sample = store.load("backlog").await;
        assert_eq!(loaded, Sample::default());
    }

    #[tokio::test]
    async fn no_leftover_temp_files_after_save() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store.save("backlog", &Sample::default()).await.unwrap();
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["backlog.json"]);
    }
}
