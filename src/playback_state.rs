use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{catalog::MediaKind, warn};

/// Durable record of the last successfully shown item. Read once at
/// startup for resume, written after every successful show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedPlayback {
    pub last_shown_path: PathBuf,
    pub last_shown_kind: MediaKind,
}

impl PersistedPlayback {
    /// Missing or corrupt state reads as `None`; resume then falls back
    /// to default cycling.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Self>(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(
                    "[STATE] Ignoring corrupt playback state at {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn store(&self, path: &Path) {
        let Ok(raw) = serde_json::to_string_pretty(self) else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(e) = fs::write(path, raw) {
            warn!(
                "[STATE] Failed to persist playback state to {}: {}",
                path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_state_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("deskloop-state-{name}.json"))
    }

    #[test]
    fn round_trips_through_disk() {
        let path = temp_state_path("roundtrip");
        let state = PersistedPlayback {
            last_shown_path: PathBuf::from(r"C:\Media\clip.mp4"),
            last_shown_kind: MediaKind::Video,
        };
        state.store(&path);

        let loaded = PersistedPlayback::load(&path).unwrap();
        assert_eq!(loaded, state);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_reads_as_none() {
        assert!(PersistedPlayback::load(Path::new(
            "deskloop-state-never-created.json"
        ))
        .is_none());
    }

    #[test]
    fn corrupt_file_reads_as_none() {
        let path = temp_state_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        assert!(PersistedPlayback::load(&path).is_none());
        let _ = fs::remove_file(&path);
    }
}
