// 🏷️ Client Flags - "has voted" / "has reported" per venue, kept on this device
//
// Never synced to the store. Clearing the file clears the flags, so this is a
// courtesy guard, not vote-fraud protection.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClientFlags {
    #[serde(default)]
    voted: BTreeMap<String, bool>,

    #[serde(default)]
    reported: BTreeMap<String, bool>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl ClientFlags {
    /// Flags that live only in memory
    pub fn in_memory() -> Self {
        ClientFlags::default()
    }

    /// Load flags from `path`; a missing file means no flags yet.
    pub fn load(path: &Path) -> Result<Self> {
        let mut flags = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read client flags: {:?}", path))?;
            serde_json::from_str::<ClientFlags>(&content)
                .with_context(|| format!("Failed to parse client flags: {:?}", path))?
        } else {
            ClientFlags::default()
        };

        flags.path = Some(path.to_path_buf());
        Ok(flags)
    }

    /// Write flags back to the file they came from. No-op for in-memory flags.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize client flags")?;
        fs::write(path, json).with_context(|| format!("Failed to write client flags: {:?}", path))?;
        Ok(())
    }

    pub fn has_voted(&self, venue_id: &str) -> bool {
        self.voted.get(venue_id).copied().unwrap_or(false)
    }

    pub fn mark_voted(&mut self, venue_id: &str) {
        self.voted.insert(venue_id.to_string(), true);
    }

    pub fn has_reported(&self, venue_id: &str) -> bool {
        self.reported.get(venue_id).copied().unwrap_or(false)
    }

    pub fn mark_reported(&mut self, venue_id: &str) {
        self.reported.insert(venue_id.to_string(), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let flags = ClientFlags::load(&dir.path().join("flags.json")).unwrap();

        assert!(!flags.has_voted("node/1"));
        assert!(!flags.has_reported("node/1"));
    }

    #[test]
    fn test_flags_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("flags.json");

        let mut flags = ClientFlags::load(&path).unwrap();
        flags.mark_voted("node/1");
        flags.mark_reported("way/2");
        flags.save().unwrap();

        let reloaded = ClientFlags::load(&path).unwrap();
        assert!(reloaded.has_voted("node/1"));
        assert!(!reloaded.has_voted("way/2"));
        assert!(reloaded.has_reported("way/2"));
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let mut flags = ClientFlags::in_memory();
        flags.mark_voted("node/1");

        assert!(flags.save().is_ok());
        assert!(flags.has_voted("node/1"));
    }
}
