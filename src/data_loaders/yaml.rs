use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex},
    time::{Duration, Instant},
};

use serde_yaml::Value;

/// The engine reads a single config file, re-checked on every hot-reload
/// tick; the short TTL keeps those ticks from re-parsing an unchanged file.
const CACHE_TTL: Duration = Duration::from_secs(1);

static CACHED: LazyLock<Mutex<Option<(PathBuf, Value, Instant)>>> =
    LazyLock::new(|| Mutex::new(None));

/// Load and parse a YAML file, serving a cached value while the TTL holds.
/// Unreadable or malformed files read as `None` and never enter the cache.
pub fn load_yaml(path: &Path) -> Option<Value> {
    let now = Instant::now();
    {
        let cache = CACHED.lock().unwrap();
        if let Some((cached_path, value, loaded_at)) = cache.as_ref() {
            if cached_path == path && now.duration_since(*loaded_at) < CACHE_TTL {
                return Some(value.clone());
            }
        }
    }

    let text = fs::read_to_string(path).ok()?;
    let value: Value = serde_yaml::from_str(&text).ok()?;
    *CACHED.lock().unwrap() = Some((path.to_path_buf(), value.clone(), now));
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_caches_within_the_ttl() {
        let path = std::env::temp_dir().join("deskloop-yaml-cache.yaml");
        std::fs::write(&path, "debug: true\n").unwrap();

        let value = load_yaml(&path).unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(
            map.get(Value::String("debug".to_string())).and_then(|v| v.as_bool()),
            Some(true)
        );

        // Within the TTL the cached value is served even after the file
        // disappears.
        std::fs::remove_file(&path).unwrap();
        assert!(load_yaml(&path).is_some());
    }

    #[test]
    fn malformed_yaml_reads_as_none() {
        let path = std::env::temp_dir().join("deskloop-yaml-bad.yaml");
        std::fs::write(&path, "a: [unclosed\n  b: ][").unwrap();
        assert!(load_yaml(&path).is_none());
        let _ = std::fs::remove_file(&path);
    }
}
