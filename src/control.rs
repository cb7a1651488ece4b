use std::path::PathBuf;

use crate::{
    catalog::{MediaItem, MediaKind},
    pause::{PauseCoordinator, PauseState},
    playlist::{MediaSurface, PlaylistEngine},
};

/// User intents arriving from the tray/UI collaborator. The facade is the
/// only path from UI code into the engine; nothing outside reaches into
/// playlist internals.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Skip to the next item, optionally restricted to one media kind.
    AdvanceNext(Option<MediaKind>),
    TogglePause,
    DropFiles(Vec<PathBuf>),
}

/// Subscription interface for the external playback indicator.
pub trait PlaybackObserver {
    fn playback_state_changed(&mut self, state: PauseState, current: Option<&MediaItem>);
}

/// Dispatch one tray/UI command against the core contracts.
pub fn dispatch(
    command: EngineCommand,
    playlist: &mut PlaylistEngine,
    pause: &mut PauseCoordinator,
    surface: &mut dyn MediaSurface,
    observers: &mut [Box<dyn PlaybackObserver>],
) {
    match command {
        EngineCommand::AdvanceNext(kind) => {
            if pause.state().is_paused() {
                return;
            }
            match kind {
                Some(kind) => {
                    let _ = playlist.advance_kind(kind, surface);
                }
                None => {
                    let _ = playlist.advance(surface);
                }
            }
        }
        EngineCommand::TogglePause => {
            if let Some(state) = pause.toggle_user_paused() {
                apply_pause_transition(state, playlist, surface, observers);
            }
        }
        EngineCommand::DropFiles(paths) => {
            let _ = playlist.ingest_dropped(&paths, surface);
        }
    }
}

/// Side effects of a published pause-state change: hide or restore the
/// active surface without losing the current item, and notify observers.
/// The display timer itself is gated by the caller checking
/// `pause.state()` before each advance tick.
pub fn apply_pause_transition(
    state: PauseState,
    playlist: &PlaylistEngine,
    surface: &mut dyn MediaSurface,
    observers: &mut [Box<dyn PlaybackObserver>],
) {
    match state {
        PauseState::Paused(_) => surface.hide(),
        PauseState::Playing => surface.restore(),
    }

    for observer in observers.iter_mut() {
        observer.playback_state_changed(state, playlist.current());
    }
}

/// Parse one tray/UI command line. Format:
/// `toggle-pause`, `next [picture|video|audio]`, `drop <path>`.
pub fn parse_command(line: &str) -> Option<EngineCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.eq_ignore_ascii_case("toggle-pause") {
        return Some(EngineCommand::TogglePause);
    }

    if let Some(rest) = strip_keyword(line, "next") {
        let kind = match rest.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "picture" => Some(MediaKind::Picture),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            _ => return None,
        };
        return Some(EngineCommand::AdvanceNext(kind));
    }

    if let Some(rest) = strip_keyword(line, "drop") {
        let path = rest.trim();
        if path.is_empty() {
            return None;
        }
        return Some(EngineCommand::DropFiles(vec![PathBuf::from(path)]));
    }

    None
}

fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        let rest = &line[keyword.len()..];
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest);
        }
    }
    None
}

/// Drain the tray collaborator's command file. The file is consumed
/// whole-and-deleted so each intent dispatches exactly once; malformed
/// lines are skipped.
pub fn drain_command_file(path: &std::path::Path) -> Vec<EngineCommand> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let _ = std::fs::remove_file(path);

    let mut commands: Vec<EngineCommand> = Vec::new();
    for line in raw.lines() {
        if let Some(command) = parse_command(line) {
            // Consecutive dropped paths merge into one ingest.
            if let (
                Some(EngineCommand::DropFiles(existing)),
                EngineCommand::DropFiles(new_paths),
            ) = (commands.last_mut(), &command)
            {
                existing.extend(new_paths.iter().cloned());
                continue;
            }
            commands.push(command);
        }
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::data_loaders::config::PausingSettings;
    use crate::pause::PauseReason;

    #[derive(Default)]
    struct FakeSurface {
        shown: Vec<PathBuf>,
        hidden: bool,
    }

    impl MediaSurface for FakeSurface {
        fn show_picture(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
            self.shown.push(item.path.clone());
            Ok(())
        }
        fn show_video(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
            self.shown.push(item.path.clone());
            Ok(())
        }
        fn play_audio(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
            self.shown.push(item.path.clone());
            Ok(())
        }
        fn hide(&mut self) {
            self.hidden = true;
        }
        fn restore(&mut self) {
            self.hidden = false;
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        states: Vec<(PauseState, Option<PathBuf>)>,
    }

    impl PlaybackObserver for RecordingObserver {
        fn playback_state_changed(&mut self, state: PauseState, current: Option<&MediaItem>) {
            self.states.push((state, current.map(|i| i.path.clone())));
        }
    }

    fn item(path: &str, kind: MediaKind) -> MediaItem {
        MediaItem {
            path: PathBuf::from(path),
            kind,
            aspect_ratio: None,
        }
    }

    fn playlist() -> PlaylistEngine {
        let mut engine = PlaylistEngine::new(None);
        engine.reload(CatalogSnapshot {
            pictures: vec![item("a.jpg", MediaKind::Picture), item("b.jpg", MediaKind::Picture)],
            videos: vec![item("c.mp4", MediaKind::Video)],
            audios: vec![item("d.mp3", MediaKind::Audio)],
        });
        engine
    }

    #[test]
    fn toggle_pause_hides_surface_and_notifies() {
        let mut playlist = playlist();
        let mut pause = PauseCoordinator::new(PausingSettings::default());
        let mut surface = FakeSurface::default();
        let mut observers: Vec<Box<dyn PlaybackObserver>> =
            vec![Box::new(RecordingObserver::default())];

        let mut probe_surface = FakeSurface::default();
        playlist.advance(&mut probe_surface);

        dispatch(
            EngineCommand::TogglePause,
            &mut playlist,
            &mut pause,
            &mut surface,
            &mut observers,
        );

        assert!(surface.hidden);
        assert_eq!(
            pause.state(),
            PauseState::Paused(PauseReason::UserRequested)
        );
        // Current item survives the pause so resume redisplays it.
        assert!(playlist.current().is_some());

        dispatch(
            EngineCommand::TogglePause,
            &mut playlist,
            &mut pause,
            &mut surface,
            &mut observers,
        );
        assert!(!surface.hidden);
        assert_eq!(pause.state(), PauseState::Playing);
    }

    #[test]
    fn advance_is_suppressed_while_paused() {
        let mut playlist = playlist();
        let mut pause = PauseCoordinator::new(PausingSettings::default());
        let mut surface = FakeSurface::default();
        let mut observers: Vec<Box<dyn PlaybackObserver>> = Vec::new();

        pause.set_user_paused(true);
        dispatch(
            EngineCommand::AdvanceNext(None),
            &mut playlist,
            &mut pause,
            &mut surface,
            &mut observers,
        );
        assert!(surface.shown.is_empty());
    }

    #[test]
    fn advance_next_of_a_kind_jumps_within_that_kind() {
        let mut playlist = playlist();
        let mut pause = PauseCoordinator::new(PausingSettings::default());
        let mut surface = FakeSurface::default();
        let mut observers: Vec<Box<dyn PlaybackObserver>> = Vec::new();

        dispatch(
            EngineCommand::AdvanceNext(Some(MediaKind::Audio)),
            &mut playlist,
            &mut pause,
            &mut surface,
            &mut observers,
        );
        assert_eq!(surface.shown, vec![PathBuf::from("d.mp3")]);
        assert_eq!(playlist.cursor(), 3);
    }

    #[test]
    fn dropped_files_flow_into_the_playlist() {
        let mut playlist = playlist();
        let mut pause = PauseCoordinator::new(PausingSettings::default());
        let mut surface = FakeSurface::default();
        let mut observers: Vec<Box<dyn PlaybackObserver>> = Vec::new();

        dispatch(
            EngineCommand::DropFiles(vec![PathBuf::from("new.png")]),
            &mut playlist,
            &mut pause,
            &mut surface,
            &mut observers,
        );
        assert_eq!(playlist.total(), 5);
    }

    #[test]
    fn parses_command_lines() {
        assert_eq!(parse_command("toggle-pause"), Some(EngineCommand::TogglePause));
        assert_eq!(parse_command("  Toggle-Pause  "), Some(EngineCommand::TogglePause));
        assert_eq!(parse_command("next"), Some(EngineCommand::AdvanceNext(None)));
        assert_eq!(
            parse_command("next video"),
            Some(EngineCommand::AdvanceNext(Some(MediaKind::Video)))
        );
        assert_eq!(
            parse_command(r"drop C:\Media\song with spaces.mp3"),
            Some(EngineCommand::DropFiles(vec![PathBuf::from(
                r"C:\Media\song with spaces.mp3"
            )]))
        );
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("next slideshow"), None);
        assert_eq!(parse_command("nextvideo"), None);
        assert_eq!(parse_command("drop"), None);
    }

    #[test]
    fn drains_and_deletes_the_command_file() {
        let path = std::env::temp_dir().join("deskloop-commands-drain.txt");
        std::fs::write(&path, "toggle-pause\ndrop a.png\ndrop b.mp3\nnext audio\n").unwrap();

        let commands = drain_command_file(&path);
        assert_eq!(
            commands,
            vec![
                EngineCommand::TogglePause,
                EngineCommand::DropFiles(vec![PathBuf::from("a.png"), PathBuf::from("b.mp3")]),
                EngineCommand::AdvanceNext(Some(MediaKind::Audio)),
            ]
        );
        // Consumed exactly once.
        assert!(!path.exists());
        assert!(drain_command_file(&path).is_empty());
    }

    #[test]
    fn observers_receive_the_published_reason() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct SharedObserver(Rc<RefCell<Vec<PauseState>>>);
        impl PlaybackObserver for SharedObserver {
            fn playback_state_changed(&mut self, state: PauseState, _current: Option<&MediaItem>) {
                self.0.borrow_mut().push(state);
            }
        }

        let playlist = playlist();
        let mut surface = FakeSurface::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut observers: Vec<Box<dyn PlaybackObserver>> =
            vec![Box::new(SharedObserver(Rc::clone(&seen)))];

        apply_pause_transition(
            PauseState::Paused(PauseReason::Battery),
            &playlist,
            &mut surface,
            &mut observers,
        );

        assert!(surface.hidden);
        assert_eq!(*seen.borrow(), vec![PauseState::Paused(PauseReason::Battery)]);
    }
}
