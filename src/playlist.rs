use std::path::{Path, PathBuf};

use crate::{
    catalog::{classify_extension, CatalogSnapshot, MediaItem, MediaKind},
    info,
    playback_state::PersistedPlayback,
    warn,
};

/// Commands the engine issues against the opaque media surface. Showing one
/// kind implicitly stops and hides the other two; at most one kind is active
/// at a time. `hide`/`restore` toggle visibility without touching the
/// current item so resuming redisplays the same item.
pub trait MediaSurface {
    fn show_picture(&mut self, item: &MediaItem) -> std::result::Result<(), String>;
    fn show_video(&mut self, item: &MediaItem) -> std::result::Result<(), String>;
    fn play_audio(&mut self, item: &MediaItem) -> std::result::Result<(), String>;
    fn hide(&mut self);
    fn restore(&mut self);
}

/// Three ordered media sequences with one logical cursor over their
/// concatenation `pictures ++ videos ++ audios`.
pub struct PlaylistEngine {
    pictures: Vec<MediaItem>,
    videos: Vec<MediaItem>,
    audios: Vec<MediaItem>,
    cursor: usize,
    current: Option<MediaItem>,
    state_path: Option<PathBuf>,
}

impl PlaylistEngine {
    pub fn new(state_path: Option<PathBuf>) -> Self {
        Self {
            pictures: Vec::new(),
            videos: Vec::new(),
            audios: Vec::new(),
            cursor: 0,
            current: None,
            state_path,
        }
    }

    pub fn total(&self) -> usize {
        self.pictures.len() + self.videos.len() + self.audios.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.current.as_ref()
    }

    /// Replace all three sequences wholesale. The cursor is wrapped via
    /// modulo so it always stays in range for the new totals.
    pub fn reload(&mut self, snapshot: CatalogSnapshot) {
        self.pictures = snapshot.pictures;
        self.videos = snapshot.videos;
        self.audios = snapshot.audios;

        let total = self.total();
        if total == 0 {
            self.cursor = 0;
        } else {
            self.cursor %= total;
        }
        info!(
            "[PLAYLIST] Reloaded: {} picture(s), {} video(s), {} audio track(s)",
            self.pictures.len(),
            self.videos.len(),
            self.audios.len()
        );
    }

    /// Step the cursor forward (mod total) and display the item there.
    ///
    /// A display failure is transient: the engine skips to the next index of
    /// the same kind, bounded by that kind's length, then falls through to
    /// the next kind in the concatenation. With everything broken this
    /// terminates after each kind has been tried once.
    pub fn advance(&mut self, surface: &mut dyn MediaSurface) -> Option<MediaItem> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        self.show_from((self.cursor + 1) % total, surface)
    }

    /// Display the item the cursor already points at, without stepping
    /// first. A fresh engine has cursor 0, so the very first display is the
    /// first cataloged item. Failure skipping follows the same bounded
    /// rules as `advance`.
    pub fn show_at_cursor(&mut self, surface: &mut dyn MediaSurface) -> Option<MediaItem> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        self.show_from(self.cursor % total, surface)
    }

    fn show_from(&mut self, start_idx: usize, surface: &mut dyn MediaSurface) -> Option<MediaItem> {
        let total = self.total();
        let mut idx = start_idx;
        let mut tried = [false; 3];

        loop {
            let kind = self.kind_of_index(idx);
            if tried[kind_slot(kind)] {
                return None;
            }
            tried[kind_slot(kind)] = true;

            let (start, len) = self.kind_range(kind);
            let first_offset = idx - start;
            for attempt in 0..len {
                let probe = start + (first_offset + attempt) % len;
                if self.try_show(probe, surface) {
                    return self.current.clone();
                }
            }

            // Every item of this kind failed; continue at the start of the
            // next kind in the concatenation.
            idx = (start + len) % total;
        }
    }

    /// Step to the next item of one specific kind, skipping broken items
    /// bounded by that kind's length.
    pub fn advance_kind(
        &mut self,
        kind: MediaKind,
        surface: &mut dyn MediaSurface,
    ) -> Option<MediaItem> {
        let (start, len) = self.kind_range(kind);
        if len == 0 {
            return None;
        }

        let first_offset = if self.cursor >= start && self.cursor < start + len {
            (self.cursor - start + 1) % len
        } else {
            0
        };
        for attempt in 0..len {
            let probe = start + (first_offset + attempt) % len;
            if self.try_show(probe, surface) {
                return self.current.clone();
            }
        }
        None
    }

    /// Display a specific item (drag-and-drop, resume). The cursor is moved
    /// to the item's index so cycling continues from there.
    pub fn show_specific(&mut self, item: &MediaItem, surface: &mut dyn MediaSurface) -> bool {
        let Some(idx) = self.index_of(&item.path, item.kind) else {
            warn!(
                "[PLAYLIST] show_specific: {} is not cataloged",
                item.path.display()
            );
            return false;
        };
        self.try_show(idx, surface)
    }

    /// Attempt to resume the item recorded before the last shutdown.
    /// Returns `false` when no state is persisted or the item is no longer
    /// cataloged; the caller falls back to default cycling.
    pub fn resume_from_persisted_state(&mut self, surface: &mut dyn MediaSurface) -> bool {
        let Some(state_path) = self.state_path.clone() else {
            return false;
        };
        let Some(persisted) = PersistedPlayback::load(&state_path) else {
            return false;
        };

        let Some(idx) = self.index_of(&persisted.last_shown_path, persisted.last_shown_kind) else {
            info!(
                "[PLAYLIST] Persisted item {} no longer cataloged",
                persisted.last_shown_path.display()
            );
            return false;
        };

        self.try_show(idx, surface)
    }

    /// Ingest externally dropped files. Supported paths are appended to the
    /// matching sequence when not already present; the first audio file
    /// found is played immediately, everything else just extends the
    /// playlist for future cycling. Returns the number of items ingested.
    pub fn ingest_dropped(&mut self, paths: &[PathBuf], surface: &mut dyn MediaSurface) -> usize {
        let mut ingested = 0;
        let mut first_audio: Option<MediaItem> = None;

        for path in paths {
            let Some(kind) = classify_extension(path) else {
                info!("[PLAYLIST] Ignoring unsupported drop {}", path.display());
                continue;
            };

            let item = MediaItem {
                path: path.clone(),
                kind,
                aspect_ratio: None,
            };

            if kind == MediaKind::Audio && first_audio.is_none() {
                first_audio = Some(item.clone());
            }

            if self.index_of(path, kind).is_some() {
                continue;
            }

            match kind {
                MediaKind::Picture => self.pictures.push(item),
                MediaKind::Video => self.videos.push(item),
                MediaKind::Audio => self.audios.push(item),
            }
            ingested += 1;
        }

        if let Some(audio) = first_audio {
            let _ = self.show_specific(&audio, surface);
        }

        ingested
    }

    fn try_show(&mut self, idx: usize, surface: &mut dyn MediaSurface) -> bool {
        let item = self.item_at(idx).clone();
        let result = match item.kind {
            MediaKind::Picture => surface.show_picture(&item),
            MediaKind::Video => surface.show_video(&item),
            MediaKind::Audio => surface.play_audio(&item),
        };

        match result {
            Ok(()) => {
                self.cursor = idx;
                self.current = Some(item.clone());
                if let Some(state_path) = &self.state_path {
                    PersistedPlayback {
                        last_shown_path: item.path.clone(),
                        last_shown_kind: item.kind,
                    }
                    .store(state_path);
                }
                info!("[PLAYLIST] Showing {}", item.path.display());
                true
            }
            Err(e) => {
                warn!("[PLAYLIST] Failed to show {}: {}", item.path.display(), e);
                false
            }
        }
    }

    fn item_at(&self, idx: usize) -> &MediaItem {
        let p = self.pictures.len();
        let v = self.videos.len();
        if idx < p {
            &self.pictures[idx]
        } else if idx < p + v {
            &self.videos[idx - p]
        } else {
            &self.audios[idx - p - v]
        }
    }

    // The kind an index falls into is always derived from the current list
    // lengths, never stored, so it cannot drift across reloads.
    fn kind_of_index(&self, idx: usize) -> MediaKind {
        let p = self.pictures.len();
        let v = self.videos.len();
        if idx < p {
            MediaKind::Picture
        } else if idx < p + v {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }

    fn kind_range(&self, kind: MediaKind) -> (usize, usize) {
        let p = self.pictures.len();
        let v = self.videos.len();
        match kind {
            MediaKind::Picture => (0, p),
            MediaKind::Video => (p, v),
            MediaKind::Audio => (p + v, self.audios.len()),
        }
    }

    fn index_of(&self, path: &Path, kind: MediaKind) -> Option<usize> {
        let (start, len) = self.kind_range(kind);
        let list = match kind {
            MediaKind::Picture => &self.pictures,
            MediaKind::Video => &self.videos,
            MediaKind::Audio => &self.audios,
        };
        debug_assert_eq!(list.len(), len);
        list.iter()
            .position(|item| paths_equal_ci(&item.path, path))
            .map(|offset| start + offset)
    }
}

/// Windows paths compare case-insensitively.
fn paths_equal_ci(a: &Path, b: &Path) -> bool {
    a.to_string_lossy()
        .to_ascii_lowercase()
        .eq(&b.to_string_lossy().to_ascii_lowercase())
}

fn kind_slot(kind: MediaKind) -> usize {
    match kind {
        MediaKind::Picture => 0,
        MediaKind::Video => 1,
        MediaKind::Audio => 2,
    }
}
