use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Locally stored metadata for a remote conversation thread
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Human-readable thread name
    pub name: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// JSON mapping of remote thread ids to local metadata
#[derive(Debug, Clone)]
pub struct ThreadRegistry {
    path: PathBuf,
}

impl ThreadRegistry {
    /// Create a registry handle for the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the registry; a missing file is an empty mapping
    pub fn load(&self) -> Result<HashMap<String, ThreadInfo>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, threads: &HashMap<String, ThreadInfo>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(threads)?)?;
        Ok(())
    }

    /// Record a newly created remote thread under a unique name.
    ///
    /// Names are compared case-insensitively; a duplicate is rejected
    /// before anything is written.
    pub fn register(&self, thread_id: &str, name: &str) -> Result<ThreadInfo> {
        let mut threads = self.load()?;

        let lowered = name.to_lowercase();
        if threads.values().any(|info| info.name.to_lowercase() == lowered) {
            return Err(AppError::Validation(
                "A thread with this name already exists".to_string(),
            ));
        }

        let info = ThreadInfo {
            name: name.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        threads.insert(thread_id.to_string(), info.clone());
        self.save(&threads)?;

        Ok(info)
    }

    /// All threads, newest first
    pub fn list(&self) -> Result<Vec<(String, ThreadInfo)>> {
        let threads = self.load()?;
        let mut entries: Vec<(String, ThreadInfo)> = threads.into_iter().collect();
        entries.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        Ok(entries)
    }

    /// Look up one thread by id
    pub fn get(&self, thread_id: &str) -> Result<ThreadInfo> {
        self.load()?
            .remove(thread_id)
            .ok_or_else(|| AppError::NotFound(format!("thread {}", thread_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = assert_fs::TempDir::new().unwrap();
        let registry = ThreadRegistry::new(dir.path().join("threads.json"));
        assert!(registry.load().unwrap().is_empty());
    }

    #[test]
    fn test_register_and_get() {
        let dir = assert_fs::TempDir::new().unwrap();
        let registry = ThreadRegistry::new(dir.path().join("threads.json"));

        let info = registry.register("thread_abc", "My order").unwrap();
        assert_eq!(info.name, "My order");

        let fetched = registry.get("thread_abc").unwrap();
        assert_eq!(fetched, info);
        assert!(matches!(
            registry.get("thread_missing"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dir = assert_fs::TempDir::new().unwrap();
        let registry = ThreadRegistry::new(dir.path().join("threads.json"));

        registry.register("thread_1", "Shoes").unwrap();
        let result = registry.register("thread_2", "SHOES");
        assert!(matches!(result, Err(AppError::Validation(_))));

        // The rejected thread was not persisted
        assert_eq!(registry.load().unwrap().len(), 1);
    }

    #[test]
    fn test_list_newest_first() {
        let dir = assert_fs::TempDir::new().unwrap();
        let registry = ThreadRegistry::new(dir.path().join("threads.json"));

        registry.register("thread_1", "first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.register("thread_2", "second").unwrap();

        let entries = registry.list().unwrap();
        assert_eq!(entries[0].0, "thread_2");
        assert_eq!(entries[1].0, "thread_1");
    }
}
