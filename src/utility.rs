use std::{
    env,
    ffi::OsStr,
    os::windows::ffi::OsStrExt,
    path::PathBuf,
};

pub fn to_wstring(s: &str) -> Vec<u16> {
    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

pub fn user_home_dir() -> Option<PathBuf> {
    env::var("USERPROFILE").map(PathBuf::from).ok()
}

/// The canonical app root is `~/.Deskloop/`. Config, log, persisted
/// playback state, and the default media folder all live here.
pub fn deskloop_root_dir() -> Option<PathBuf> {
    user_home_dir().map(|p| p.join(".Deskloop"))
}

pub fn deskloop_media_dir() -> Option<PathBuf> {
    deskloop_root_dir().map(|p| p.join("Media"))
}

pub fn config_path() -> PathBuf {
    deskloop_root_dir()
        .map(|p| p.join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

/// The tray collaborator appends command lines here; the engine drains
/// and deletes the file on its fast poll tick.
pub fn command_queue_path() -> PathBuf {
    deskloop_root_dir()
        .map(|p| p.join("commands.txt"))
        .unwrap_or_else(|| PathBuf::from("commands.txt"))
}

pub fn playback_state_path() -> PathBuf {
    deskloop_root_dir()
        .map(|p| p.join("playback_state.json"))
        .unwrap_or_else(|| PathBuf::from("playback_state.json"))
}

pub fn path_to_file_url(path: &std::path::Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    format!("file:///{normalized}")
}
