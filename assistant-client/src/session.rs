//! Identifiers of the remote resources created on behalf of the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use crate::error::Result;

/// The active credential and at most one tracked id per resource kind.
///
/// An id is only meaningful while the remote resource exists; whoever deletes
/// a resource must clear the matching field.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_store_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for an already validated key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Forget every tracked resource id. The API key is kept.
    pub fn clear_resources(&mut self) {
        self.file_id = None;
        self.vector_store_id = None;
        self.assistant_id = None;
        self.thread_id = None;
    }

    /// True when no resource id is tracked.
    pub fn is_empty(&self) -> bool {
        self.file_id.is_none()
            && self.vector_store_id.is_none()
            && self.assistant_id.is_none()
            && self.thread_id.is_none()
    }

    /// Load a saved session, or an empty one if `path` doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut session = self.clone();
        session.updated_at = Some(Utc::now());

        let writer = BufWriter::new(create_private(path)?);
        serde_json::to_writer_pretty(writer, &session)?;
        Ok(())
    }
}

/// Open `path` for writing, readable by the owner only. The file holds the API key.
#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<File> {
    File::create(path)
}

/// Keeps the key out of logs.
impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("file_id", &self.file_id)
            .field("vector_store_id", &self.vector_store_id)
            .field("assistant_id", &self.assistant_id)
            .field("thread_id", &self.thread_id)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_resources_keeps_key() {
        let mut session = SessionState::with_api_key("sk-test");
        session.file_id = Some("file_1".to_string());
        session.thread_id = Some("thread_1".to_string());
        assert!(!session.is_empty());

        session.clear_resources();
        assert!(session.is_empty());
        assert_eq!(session.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let session = SessionState::with_api_key("sk-secret");
        let debug = format!("{:?}", session);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = SessionState::with_api_key("sk-test");
        session.vector_store_id = Some("vs_1".to_string());
        session.save_to(&path).unwrap();

        let loaded = SessionState::load_from(&path).unwrap();
        assert_eq!(loaded.vector_store_id.as_deref(), Some("vs_1"));
        assert!(loaded.updated_at.is_some());
        assert!(loaded.file_id.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = SessionState::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(loaded, SessionState::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        SessionState::with_api_key("sk-secret").save_to(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let loaded = SessionState::load_from(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("sk-secret"));
    }
}
