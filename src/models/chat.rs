use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Who authored a chat message
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Message written by the user (or the image search step on their behalf)
    User,
    /// Message produced by the hosted agent
    Assistant,
}

/// One message of a thread's chat history
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message author
    pub role: ChatRole,
    /// Text content
    pub content: String,
}

impl ChatMessage {
    /// Build a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-thread chat history, one JSON file per thread id
#[derive(Debug, Clone)]
pub struct ChatHistoryStore {
    dir: PathBuf,
}

impl ChatHistoryStore {
    /// Create a store rooted at the given directory
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn file_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", thread_id))
    }

    /// Read a thread's history; a missing file is an empty list
    pub fn load(&self, thread_id: &str) -> Result<Vec<ChatMessage>> {
        let path = self.file_for(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overwrite a thread's history, creating the directory on demand
    pub fn save(&self, thread_id: &str, messages: &[ChatMessage]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.file_for(thread_id), serde_json::to_string(messages)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_history_is_empty() {
        let dir = assert_fs::TempDir::new().unwrap();
        let store = ChatHistoryStore::new(dir.path().join("chat_history"));
        assert!(store.load("thread_abc").unwrap().is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = assert_fs::TempDir::new().unwrap();
        let store = ChatHistoryStore::new(dir.path().join("chat_history"));

        let messages = vec![
            ChatMessage::user("do you have red shoes?"),
            ChatMessage::assistant("Yes, in sizes 38-42."),
        ];
        store.save("thread_abc", &messages).unwrap();

        let reloaded = store.load("thread_abc").unwrap();
        assert_eq!(reloaded, messages);
        assert_eq!(reloaded[0].role, ChatRole::User);
    }

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));

        let parsed: ChatMessage =
            serde_json::from_str("{\"role\":\"user\",\"content\":\"hello\"}").unwrap();
        assert_eq!(parsed.role, ChatRole::User);
    }
}
