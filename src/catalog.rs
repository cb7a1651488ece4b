use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::warn;

/// Tolerance for matching a picture against the configured aspect-ratio
/// allow-list.
pub const ASPECT_TOLERANCE: f64 = 0.01;

const PICTURE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "webm", "mov"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac", "wma"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Picture,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub aspect_ratio: Option<f64>,
}

/// The three media sequences produced by one enumeration pass. Each list is
/// sorted by path so cycling order is reproducible across restarts.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub pictures: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
    pub audios: Vec<MediaItem>,
}

impl CatalogSnapshot {
    pub fn total(&self) -> usize {
        self.pictures.len() + self.videos.len() + self.audios.len()
    }
}

pub fn classify_extension(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if PICTURE_EXTENSIONS.contains(&ext.as_str()) {
        return Some(MediaKind::Picture);
    }
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Some(MediaKind::Video);
    }
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return Some(MediaKind::Audio);
    }
    None
}

pub fn aspect_ratio_allowed(ratio: f64, allow_list: &[f64]) -> bool {
    allow_list.iter().any(|r| (r - ratio).abs() <= ASPECT_TOLERANCE)
}

/// Enumerate the media folder tree into the three kind sequences.
///
/// Returns `None` when the root folder is missing or unreadable so the
/// caller can keep its previous in-memory lists authoritative.
pub fn enumerate(root: &Path, aspect_ratios: &[f64]) -> Option<CatalogSnapshot> {
    enumerate_with(root, aspect_ratios, &probe_image_dimensions)
}

/// Enumeration with an injectable picture-dimension probe.
pub fn enumerate_with(
    root: &Path,
    aspect_ratios: &[f64],
    dimensions: &dyn Fn(&Path) -> Option<(u32, u32)>,
) -> Option<CatalogSnapshot> {
    if !root.is_dir() {
        return None;
    }

    let mut snapshot = CatalogSnapshot::default();
    collect_into(root, aspect_ratios, dimensions, &mut snapshot);

    sort_by_path(&mut snapshot.pictures);
    sort_by_path(&mut snapshot.videos);
    sort_by_path(&mut snapshot.audios);

    Some(snapshot)
}

fn collect_into(
    dir: &Path,
    aspect_ratios: &[f64],
    dimensions: &dyn Fn(&Path) -> Option<(u32, u32)>,
    snapshot: &mut CatalogSnapshot,
) {
    let Ok(entries) = fs::read_dir(dir) else {
        warn!("[CATALOG] Cannot read directory {}", dir.display());
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_into(&path, aspect_ratios, dimensions, snapshot);
            continue;
        }

        let Some(kind) = classify_extension(&path) else {
            continue;
        };

        match kind {
            MediaKind::Picture => {
                let Some((w, h)) = dimensions(&path) else {
                    warn!("[CATALOG] Cannot read dimensions of {}", path.display());
                    continue;
                };
                if h == 0 {
                    continue;
                }
                let ratio = w as f64 / h as f64;
                if !aspect_ratio_allowed(ratio, aspect_ratios) {
                    continue;
                }
                snapshot.pictures.push(MediaItem {
                    path,
                    kind,
                    aspect_ratio: Some(ratio),
                });
            }
            MediaKind::Video => snapshot.videos.push(MediaItem {
                path,
                kind,
                aspect_ratio: None,
            }),
            MediaKind::Audio => snapshot.audios.push(MediaItem {
                path,
                kind,
                aspect_ratio: None,
            }),
        }
    }
}

fn sort_by_path(items: &mut [MediaItem]) {
    items.sort_by(|a, b| {
        a.path
            .to_string_lossy()
            .to_ascii_lowercase()
            .cmp(&b.path.to_string_lossy().to_ascii_lowercase())
    });
}

fn probe_image_dimensions(path: &Path) -> Option<(u32, u32)> {
    image::image_dimensions(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_tree(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("deskloop-catalog-{name}"));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"x").unwrap();
    }

    #[test]
    fn classifies_by_extension_case_insensitively() {
        assert_eq!(
            classify_extension(Path::new("a/B.JPG")),
            Some(MediaKind::Picture)
        );
        assert_eq!(
            classify_extension(Path::new("c.mkv")),
            Some(MediaKind::Video)
        );
        assert_eq!(
            classify_extension(Path::new("d.FLAC")),
            Some(MediaKind::Audio)
        );
        assert_eq!(classify_extension(Path::new("readme.txt")), None);
        assert_eq!(classify_extension(Path::new("noext")), None);
    }

    #[test]
    fn aspect_tolerance_is_one_hundredth() {
        let allowed = [16.0 / 9.0];
        assert!(aspect_ratio_allowed(16.0 / 9.0, &allowed));
        assert!(aspect_ratio_allowed(16.0 / 9.0 + 0.009, &allowed));
        assert!(!aspect_ratio_allowed(16.0 / 9.0 + 0.02, &allowed));
    }

    #[test]
    fn missing_root_yields_none() {
        let root = std::env::temp_dir().join("deskloop-catalog-does-not-exist");
        assert!(enumerate_with(&root, &[16.0 / 9.0], &|_| None).is_none());
    }

    #[test]
    fn enumerates_recursively_and_sorts() {
        let root = temp_tree("sorts");
        touch(&root, "b.jpg");
        touch(&root, "sub/A.jpg");
        touch(&root, "c.mp4");
        touch(&root, "z.mp3");
        touch(&root, "notes.txt");

        let snapshot = enumerate_with(&root, &[1.0], &|_| Some((100, 100))).unwrap();
        assert_eq!(snapshot.videos.len(), 1);
        assert_eq!(snapshot.audios.len(), 1);
        assert_eq!(snapshot.pictures.len(), 2);
        // Lexicographic by full lowercase path: root/b.jpg before root/sub/A.jpg
        assert!(snapshot.pictures[0].path.ends_with("b.jpg"));
        assert!(snapshot.pictures[1].path.ends_with("A.jpg"));
        assert_eq!(snapshot.total(), 4);
    }

    #[test]
    fn filters_pictures_by_aspect_allow_list() {
        let root = temp_tree("aspect");
        touch(&root, "wide.jpg");
        touch(&root, "square.jpg");

        let probe = |path: &Path| {
            if path.ends_with("wide.jpg") {
                Some((1920, 1080))
            } else {
                Some((500, 500))
            }
        };

        let snapshot = enumerate_with(&root, &[16.0 / 9.0], &probe).unwrap();
        assert_eq!(snapshot.pictures.len(), 1);
        assert!(snapshot.pictures[0].path.ends_with("wide.jpg"));
        let ratio = snapshot.pictures[0].aspect_ratio.unwrap();
        assert!((ratio - 16.0 / 9.0).abs() < 0.001);
    }

    #[test]
    fn unreadable_picture_dimensions_exclude_the_picture() {
        let root = temp_tree("unreadable");
        touch(&root, "broken.png");

        let snapshot = enumerate_with(&root, &[1.0], &|_| None).unwrap();
        assert!(snapshot.pictures.is_empty());
    }
}
