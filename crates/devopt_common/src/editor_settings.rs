//! Editor settings store
//!
//! Reads and writes the editor's `settings.json`. A missing or unparsable
//! file is an empty document, never an error. Writes always replace the
//! whole file.

use crate::types::ConfigDocument;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Settings persistence errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("could not serialize settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fixed-path JSON settings document
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, treating absence or malformed content as empty
    pub fn load(&self) -> ConfigDocument {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No editor settings at {}: {}", self.path.display(), e);
                return ConfigDocument::new();
            }
        };

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Object(doc)) => doc,
            Ok(_) => {
                warn!("Editor settings at {} are not a JSON object, ignoring", self.path.display());
                ConfigDocument::new()
            }
            Err(e) => {
                warn!("Malformed editor settings at {}: {}", self.path.display(), e);
                ConfigDocument::new()
            }
        }
    }

    /// Overwrite the file with the pretty-printed document
    pub fn save(&self, doc: &ConfigDocument) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        doc.serialize(&mut ser)?;
        buf.push(b'\n');

        fs::write(&self.path, buf)?;
        info!("Wrote editor settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join("settings.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_malformed_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, "{ \"editor.fontSize\": 14,, }").unwrap();

        let store = SettingsStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_non_object_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(SettingsStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join("Code/User/settings.json"));

        let mut doc = ConfigDocument::new();
        doc.insert("editor.fontSize".to_string(), json!(16));
        doc.insert("extensions".to_string(), json!(["rust-analyzer"]));
        store.save(&doc).unwrap();

        assert_eq!(store.load(), doc);
    }

    #[test]
    fn test_save_uses_four_space_indent() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join("settings.json"));

        let mut doc = ConfigDocument::new();
        doc.insert("editor.renderWhitespace".to_string(), json!("all"));
        store.save(&doc).unwrap();

        let written = fs::read_to_string(store.path()).unwrap();
        assert_eq!(written, "{\n    \"editor.renderWhitespace\": \"all\"\n}\n");
    }

    #[test]
    fn test_save_overwrites_whole_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{"old.key": true, "editor.fontSize": 10}"#).unwrap();
        let store = SettingsStore::new(&path);

        let mut doc = ConfigDocument::new();
        doc.insert("editor.fontSize".to_string(), json!(14));
        store.save(&doc).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get("old.key").is_none());
    }
}
