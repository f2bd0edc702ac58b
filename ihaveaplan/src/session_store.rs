//! Where the CLI keeps the session between invocations.

use anyhow::{Context, Result};
use assistant_client::SessionState;
use std::path::PathBuf;

/// Get the session file path: <data_local_dir>/ihaveaplan/session.json
pub fn session_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("ihaveaplan"))
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    Ok(data_dir.join("session.json"))
}

pub fn load() -> Result<SessionState> {
    let path = session_path()?;
    SessionState::load_from(&path)
        .with_context(|| format!("Failed to read session file {}", path.display()))
}

pub fn save(session: &SessionState) -> Result<()> {
    let path = session_path()?;
    session
        .save_to(&path)
        .with_context(|| format!("Failed to write session file {}", path.display()))
}
