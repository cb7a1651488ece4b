use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};

/// Watches the playlist's source folder tree by polling its newest file
/// mtime. A burst of changes produces one reload signal after the quiet
/// period elapses.
pub struct DirectoryWatcher {
    root: PathBuf,
    debounce: Duration,
    last_seen: Option<SystemTime>,
    pending_since: Option<Instant>,
}

impl DirectoryWatcher {
    pub fn new(root: PathBuf, debounce: Duration) -> Self {
        Self {
            last_seen: newest_file_modified_recursive(&root),
            root,
            debounce,
            pending_since: None,
        }
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    /// Point the watcher at a different folder, dropping any pending signal.
    pub fn set_root(&mut self, root: PathBuf) {
        if root == self.root {
            return;
        }
        self.last_seen = newest_file_modified_recursive(&root);
        self.root = root;
        self.pending_since = None;
    }

    /// One poll tick. Returns `true` when a change burst has settled and
    /// the playlist should re-index.
    pub fn tick(&mut self, now: Instant) -> bool {
        let newest = newest_file_modified_recursive(&self.root);
        self.tick_with(now, newest)
    }

    fn tick_with(&mut self, now: Instant, newest: Option<SystemTime>) -> bool {
        // Any mtime difference counts: deletions can lower the newest mtime
        // and still require a re-index.
        let changed = match (self.last_seen, newest) {
            (Some(prev), Some(curr)) => curr != prev,
            (None, Some(_)) => true,
            _ => false,
        };

        if changed {
            self.last_seen = newest;
            self.pending_since = Some(now);
            return false;
        }

        if let Some(since) = self.pending_since {
            if now.duration_since(since) >= self.debounce {
                self.pending_since = None;
                return true;
            }
        }

        false
    }
}

fn should_ignore_path(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };

    let lower_name = file_name.to_ascii_lowercase();
    lower_name.ends_with(".tmp")
        || lower_name.ends_with(".temp")
        || lower_name.ends_with(".swp")
        || lower_name.ends_with(".bak")
        || lower_name.starts_with(".~")
}

fn newest_file_modified_recursive(dir: &Path) -> Option<SystemTime> {
    let mut newest: Option<SystemTime> = None;
    let entries = fs::read_dir(dir).ok()?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(child_newest) = newest_file_modified_recursive(&path) {
                newest = match newest {
                    Some(current) if current >= child_newest => Some(current),
                    _ => Some(child_newest),
                };
            }
        } else {
            if should_ignore_path(&path) {
                continue;
            }

            let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) else {
                continue;
            };

            newest = match newest {
                Some(current) if current >= modified => Some(current),
                _ => Some(modified),
            };
        }
    }

    newest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watcher(debounce_secs: u64) -> DirectoryWatcher {
        // The root never exists; scans are driven through tick_with.
        DirectoryWatcher::new(
            PathBuf::from("deskloop-watcher-test-root"),
            Duration::from_secs(debounce_secs),
        )
    }

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn quiet_tree_never_signals() {
        let mut w = watcher(30);
        let base = Instant::now();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        w.last_seen = Some(t0);

        for i in 0..10 {
            assert!(!w.tick_with(at(base, i), Some(t0)));
        }
    }

    #[test]
    fn signals_once_after_the_quiet_period() {
        let mut w = watcher(30);
        let base = Instant::now();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        let t1 = t0 + Duration::from_secs(5);
        w.last_seen = Some(t0);

        assert!(!w.tick_with(at(base, 0), Some(t1)));
        // Still inside the quiet window.
        assert!(!w.tick_with(at(base, 10), Some(t1)));
        assert!(w.tick_with(at(base, 31), Some(t1)));
        // One signal per burst.
        assert!(!w.tick_with(at(base, 32), Some(t1)));
    }

    #[test]
    fn burst_of_changes_restarts_the_quiet_window() {
        let mut w = watcher(30);
        let base = Instant::now();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        w.last_seen = Some(t0);

        assert!(!w.tick_with(at(base, 0), Some(t0 + Duration::from_secs(1))));
        // A later write inside the window restarts the debounce.
        assert!(!w.tick_with(at(base, 20), Some(t0 + Duration::from_secs(2))));
        assert!(!w.tick_with(at(base, 31), Some(t0 + Duration::from_secs(2))));
        assert!(w.tick_with(at(base, 50), Some(t0 + Duration::from_secs(2))));
    }

    #[test]
    fn deletion_that_lowers_the_newest_mtime_signals() {
        let mut w = watcher(30);
        let base = Instant::now();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        w.last_seen = Some(t0);

        // The newest file was removed; the surviving newest mtime is older.
        let older = t0 - Duration::from_secs(100);
        assert!(!w.tick_with(at(base, 0), Some(older)));
        assert!(w.tick_with(at(base, 31), Some(older)));
    }

    #[test]
    fn vanished_folder_is_silent() {
        let mut w = watcher(30);
        let base = Instant::now();
        w.last_seen = Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1000));

        assert!(!w.tick_with(at(base, 0), None));
        assert!(!w.tick_with(at(base, 60), None));
    }

    #[test]
    fn editor_temp_artifacts_are_ignored() {
        assert!(should_ignore_path(Path::new("a/clip.mp4.tmp")));
        assert!(should_ignore_path(Path::new("a/.~lock.jpg")));
        assert!(should_ignore_path(Path::new("photo.bak")));
        assert!(!should_ignore_path(Path::new("photo.jpg")));
    }
}
