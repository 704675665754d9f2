//! Named offsets loaded from versioned JSON files
//!
//! A file looks like:
//!
//! ```json
//! { "GameVersion": "2024.06.18", "OffsetVersion": 3, "Housing": "1F0A2B8", "Slots": "10,20" }
//! ```
//!
//! Values are hex strings; a comma-separated value names several instances.

use crate::core::types::{parse_hex, MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Anything that can map an offset name to its values
pub trait OffsetSource: Send + Sync {
    fn lookup_offset(&self, name: &str) -> MemoryResult<Vec<u64>>;
}

/// One offset file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetFile {
    #[serde(rename = "GameVersion")]
    pub game_version: String,

    #[serde(rename = "OffsetVersion")]
    pub offset_version: u32,

    #[serde(flatten)]
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl OffsetFile {
    pub fn from_json(json: &str) -> MemoryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> MemoryResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Loads `path`, logging and discarding any failure
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Couldn't load offset file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Names of the string-valued entries
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_string())
            .map(|(k, _)| k.as_str())
    }
}

impl OffsetSource for OffsetFile {
    fn lookup_offset(&self, name: &str) -> MemoryResult<Vec<u64>> {
        let raw = self
            .entries
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| MemoryError::OffsetNotFound(name.to_string()))?;

        raw.split(',')
            .map(|part| parse_hex(part.trim()))
            .collect::<MemoryResult<Vec<u64>>>()
            .map_err(|_| MemoryError::InvalidOffset(format!("{name} = {raw:?}")))
    }
}

/// Picks between a local and an updated offset file.
///
/// With equal game versions the higher offset version wins, ties keep the
/// local file. Otherwise the greater game version (compared as strings) wins.
pub fn reconcile(local: Option<OffsetFile>, update: Option<OffsetFile>) -> MemoryResult<OffsetFile> {
    let chosen = match (local, update) {
        (None, None) => return Err(MemoryError::NoOffsetFile),
        (Some(local), None) => local,
        (None, Some(update)) => update,
        (Some(local), Some(update)) => {
            if local.game_version == update.game_version {
                if update.offset_version > local.offset_version {
                    update
                } else {
                    local
                }
            } else if update.game_version > local.game_version {
                update
            } else {
                local
            }
        }
    };

    info!(
        game_version = %chosen.game_version,
        offset_version = chosen.offset_version,
        "Using offsets"
    );
    Ok(chosen)
}
