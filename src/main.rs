#![windows_subsystem = "windows"]

mod catalog;
mod control;
mod data_loaders;
mod input_bridge;
mod instance_lock;
mod logging;
mod media_surface;
mod pause;
mod playback_state;
mod playlist;
mod surface_binder;
mod topology;
mod utility;
mod watcher;

use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant, SystemTime},
};

use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, WM_QUIT,
};

use crate::{
    catalog::MediaItem,
    control::PlaybackObserver,
    data_loaders::config::AppConfig,
    input_bridge::{InputBridge, PointerTarget},
    instance_lock::InstanceLock,
    media_surface::{attach_surfaces, SurfaceGroup},
    pause::{PauseCoordinator, PauseState, Win32SignalProbe},
    playlist::{MediaSurface, PlaylistEngine},
    surface_binder::{BoundSurface, DesktopSurfaceBinder, Win32Shell},
    topology::DisplayTopology,
    utility::{command_queue_path, config_path, deskloop_media_dir, deskloop_root_dir, playback_state_path},
    watcher::DirectoryWatcher,
};

pub const APP_NAME: &str = "deskloop";
pub const DEBUG_NAME: &str = "DESKLOOP";

fn enable_per_monitor_dpi_awareness() {
    unsafe {
        if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2).is_err() {
            warn!(
                "[{}] Failed to set process DPI awareness to PerMonitorV2; monitor sizes may be scaled",
                DEBUG_NAME
            );
        }
    }
}

fn ensure_app_dirs() {
    if let Some(root) = deskloop_root_dir() {
        let _ = fs::create_dir_all(&root);
    }
    if let Some(media) = deskloop_media_dir() {
        let _ = fs::create_dir_all(&media);
    }
}

fn pointer_targets(bound: &[BoundSurface]) -> Vec<PointerTarget> {
    bound
        .iter()
        .map(|surface| PointerTarget {
            host: surface.host,
            bounds: surface.monitor.bounds,
        })
        .collect()
}

/// Re-index the media folder into the playlist. Returns `false` when the
/// folder is missing or not configured; the playlist is left untouched.
fn reload_catalog(playlist: &mut PlaylistEngine, config: &AppConfig) -> bool {
    let Some(root) = &config.media_folder else {
        warn!("[{}] No media folder configured", DEBUG_NAME);
        return false;
    };

    match catalog::enumerate(root, &config.settings.playback.aspect_ratios) {
        Some(snapshot) => {
            playlist.reload(snapshot);
            true
        }
        None => {
            warn!(
                "[{}] Media folder {} is missing; keeping previous playlist",
                DEBUG_NAME,
                root.display()
            );
            false
        }
    }
}

/// Logs published pause transitions for the external playback indicator
/// audience; gated by the diagnostics flag so it can be silenced at runtime.
struct PauseLogObserver {
    verbose: Arc<AtomicBool>,
}

impl PlaybackObserver for PauseLogObserver {
    fn playback_state_changed(&mut self, state: PauseState, current: Option<&MediaItem>) {
        if !self.verbose.load(Ordering::Relaxed) {
            return;
        }
        match state {
            PauseState::Paused(reason) => {
                warn!("[{}][PAUSE] Playback paused ({:?})", DEBUG_NAME, reason);
            }
            PauseState::Playing => {
                let item = current
                    .map(|i| i.path.display().to_string())
                    .unwrap_or_else(|| "nothing".to_string());
                warn!("[{}][PAUSE] Playback resumed; showing {}", DEBUG_NAME, item);
            }
        }
    }
}

fn main() -> windows::core::Result<()> {
    ensure_app_dirs();
    logging::init(false);
    std::panic::set_hook(Box::new(|panic_info| {
        error!("[{}] Panic: {}", DEBUG_NAME, panic_info);
    }));

    let _lock = match InstanceLock::acquire() {
        Ok(lock) => lock,
        Err(e) => {
            warn!("[{}] {}; exiting", DEBUG_NAME, e);
            return Ok(());
        }
    };

    enable_per_monitor_dpi_awareness();
    unsafe {
        CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok()?;
    }

    let config_path = config_path();
    let mut config = AppConfig::load(&config_path).unwrap_or_default();
    logging::set_debug(config.debug);

    info!("!---------- [{}] Starting {} ----------!", DEBUG_NAME, APP_NAME);
    info!("[{}] Config loaded from {}", DEBUG_NAME, config_path.display());

    let mut topology = DisplayTopology::new();
    let mut binder = DesktopSurfaceBinder::new(Win32Shell::new());
    let bound_count = binder.rebind_all(&topology.snapshot());
    if bound_count == 0 {
        warn!("[{}] No monitor could be bound; running headless until a topology change", DEBUG_NAME);
    }

    let mut surfaces = attach_surfaces(
        binder.bound(),
        config.settings.interactions.send_move,
        config.settings.interactions.send_click,
    );
    if surfaces.is_empty() {
        warn!("[{}] No media surface attached; playback is display-less", DEBUG_NAME);
    }

    let mut playlist = PlaylistEngine::new(Some(playback_state_path()));
    reload_catalog(&mut playlist, &config);

    if !playlist.resume_from_persisted_state(&mut surfaces) {
        // No resume: start at the first cataloged item, not the second.
        let _ = playlist.show_at_cursor(&mut surfaces);
    }

    let mut pause = PauseCoordinator::new(config.settings.pausing.clone());
    let mut probe = Win32SignalProbe::new();
    let pause_log_verbose = Arc::new(AtomicBool::new(
        config.settings.diagnostics.log_pause_state_changes,
    ));
    let mut observers: Vec<Box<dyn PlaybackObserver>> = vec![Box::new(PauseLogObserver {
        verbose: Arc::clone(&pause_log_verbose),
    })];

    let media_root = config
        .media_folder
        .clone()
        .or_else(deskloop_media_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut media_watcher = DirectoryWatcher::new(
        media_root,
        Duration::from_secs(config.settings.watcher.debounce_secs),
    );

    let mut input = InputBridge::new();
    input.set_targets(pointer_targets(binder.bound()));
    let mut input_poll = Duration::from_millis(config.settings.interactions.poll_interval_ms.max(1));
    input.start(input_poll);

    let command_path = command_queue_path();

    let mut advance_interval = Duration::from_secs(config.settings.playback.advance_interval_secs);
    let mut system_poll_interval =
        Duration::from_millis(config.settings.pausing.system_poll_interval_ms);
    let mut user_poll_interval = Duration::from_millis(config.settings.pausing.user_poll_interval_ms);
    let mut scan_interval = Duration::from_millis(config.settings.watcher.scan_interval_ms);
    let mut topology_interval =
        Duration::from_millis(config.settings.runtime.topology_check_interval_ms);
    let mut loop_sleep = Duration::from_millis(config.settings.runtime.tick_sleep_ms.max(1));
    let mut watcher_enabled = config.settings.watcher.enabled;

    let mut next_advance = Instant::now() + advance_interval;
    let mut last_user_poll = Instant::now();
    let mut last_pause_poll = Instant::now();
    let mut last_topology_check = Instant::now();
    let mut last_watch_tick = Instant::now();
    let mut last_config_modified: Option<SystemTime> = fs::metadata(&config_path)
        .and_then(|m| m.modified())
        .ok();

    loop {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    warn!("[{}] WM_QUIT received; shutting down", DEBUG_NAME);
                    // Reverse of startup order: the pointer sampler stops
                    // first so no message targets a dying host, then the
                    // surfaces release their controllers, then the host
                    // windows are destroyed.
                    input.stop();
                    drop(surfaces);
                    binder.unbind_all();
                    info!("[{}] Shutdown complete", DEBUG_NAME);
                    return Ok(());
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        // Fast tick: drain explicit user intents.
        if last_user_poll.elapsed() >= user_poll_interval {
            last_user_poll = Instant::now();
            for command in control::drain_command_file(&command_path) {
                control::dispatch(
                    command,
                    &mut playlist,
                    &mut pause,
                    &mut surfaces,
                    &mut observers,
                );
                // Manual skips and resumes restart the display interval.
                next_advance = Instant::now() + advance_interval;
            }
        }

        if Instant::now() >= next_advance {
            next_advance = Instant::now() + advance_interval;
            if !pause.state().is_paused() {
                let _ = playlist.advance(&mut surfaces);
            }
        }

        // Slow tick: system pause signals.
        if last_pause_poll.elapsed() >= system_poll_interval {
            last_pause_poll = Instant::now();
            if let Some(state) = pause.poll(&mut probe) {
                control::apply_pause_transition(state, &playlist, &mut surfaces, &mut observers);
                if state == PauseState::Playing {
                    // Resume grants the restored item a fresh interval.
                    next_advance = Instant::now() + advance_interval;
                }
            }
        }

        // Detect monitor layout changes (rearranged, added, removed,
        // resolution) and rebind so hosts land on the correct rects.
        if last_topology_check.elapsed() >= topology_interval {
            last_topology_check = Instant::now();
            if topology.refresh() {
                input.set_targets(Vec::new());
                drop(std::mem::replace(&mut surfaces, SurfaceGroup::new(Vec::new())));
                let bound = binder.rebind_all(&topology.snapshot());
                warn!("[{}][MONITORS] Layout change; {} monitor(s) rebound", DEBUG_NAME, bound);

                surfaces = attach_surfaces(
                    binder.bound(),
                    config.settings.interactions.send_move,
                    config.settings.interactions.send_click,
                );
                input.set_targets(pointer_targets(binder.bound()));

                match playlist.current().cloned() {
                    Some(item) => {
                        let _ = playlist.show_specific(&item, &mut surfaces);
                    }
                    None => {
                        let _ = playlist.show_at_cursor(&mut surfaces);
                    }
                }
                if pause.state().is_paused() {
                    surfaces.hide();
                }
            }
        }

        if watcher_enabled && last_watch_tick.elapsed() >= scan_interval {
            last_watch_tick = Instant::now();

            let current_modified = fs::metadata(&config_path)
                .and_then(|m| m.modified())
                .ok();
            let config_changed = match (last_config_modified, current_modified) {
                (Some(prev), Some(curr)) => curr > prev,
                (None, Some(_)) => true,
                _ => false,
            };

            if config_changed {
                match AppConfig::load(&config_path) {
                    Some(new_config) => {
                        config = new_config;
                        logging::set_debug(config.debug);
                        pause.update_settings(config.settings.pausing.clone());
                        pause_log_verbose.store(
                            config.settings.diagnostics.log_pause_state_changes,
                            Ordering::Relaxed,
                        );

                        advance_interval =
                            Duration::from_secs(config.settings.playback.advance_interval_secs);
                        system_poll_interval =
                            Duration::from_millis(config.settings.pausing.system_poll_interval_ms);
                        user_poll_interval =
                            Duration::from_millis(config.settings.pausing.user_poll_interval_ms);
                        scan_interval =
                            Duration::from_millis(config.settings.watcher.scan_interval_ms);
                        topology_interval = Duration::from_millis(
                            config.settings.runtime.topology_check_interval_ms,
                        );
                        loop_sleep =
                            Duration::from_millis(config.settings.runtime.tick_sleep_ms.max(1));
                        watcher_enabled = config.settings.watcher.enabled;

                        media_watcher
                            .set_debounce(Duration::from_secs(config.settings.watcher.debounce_secs));
                        if let Some(root) = config.media_folder.clone() {
                            media_watcher.set_root(root);
                        }

                        let new_input_poll = Duration::from_millis(
                            config.settings.interactions.poll_interval_ms.max(1),
                        );
                        if new_input_poll != input_poll {
                            input_poll = new_input_poll;
                            input.stop();
                            input.start(input_poll);
                        }

                        reload_catalog(&mut playlist, &config);
                        if config.settings.diagnostics.log_watcher_reloads {
                            warn!(
                                "[{}][WATCHER] Reloaded config from {}",
                                DEBUG_NAME,
                                config_path.display()
                            );
                        }
                    }
                    None => {
                        warn!(
                            "[{}][WATCHER] Detected config change but failed to parse {}; keeping previous config",
                            DEBUG_NAME,
                            config_path.display()
                        );
                    }
                }

                last_config_modified = current_modified;
            }

            if media_watcher.tick(Instant::now()) {
                if reload_catalog(&mut playlist, &config)
                    && config.settings.diagnostics.log_watcher_reloads
                {
                    warn!(
                        "[{}][WATCHER] Media folder changed; playlist re-indexed ({} item(s))",
                        DEBUG_NAME,
                        playlist.total()
                    );
                }
            }
        }

        thread::sleep(loop_sleep);
    }
}
