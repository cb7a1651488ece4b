use crate::{data_loaders::config::PausingSettings, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    None,
    UserRequested,
    Battery,
    Fullscreen,
    HighCpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Playing,
    Paused(PauseReason),
}

impl PauseState {
    pub fn is_paused(&self) -> bool {
        matches!(self, PauseState::Paused(_))
    }
}

/// Raw reads of the slow-changing system signals. Every accessor returns
/// `None` when the signal cannot be queried; the coordinator reads that as
/// "signal false" for the tick and logs it.
pub trait SignalProbe {
    /// Battery charge percentage while discharging. `None` on AC power or
    /// when the power status cannot be read.
    fn battery_percent(&mut self) -> Option<u8>;

    /// Whether the current foreground window covers an entire monitor.
    fn foreground_fullscreen(&mut self) -> Option<bool>;

    /// Total CPU load percentage since the previous call. `None` until a
    /// baseline sample exists.
    fn cpu_percent(&mut self) -> Option<u8>;
}

/// Aggregates the four independent pause signals into one authoritative
/// `Playing | Paused(reason)` output. The published reason is the highest
/// priority active signal: User > Battery > Fullscreen > HighCpu, so a
/// user-requested pause is never reported as a transient system pause.
pub struct PauseCoordinator {
    settings: PausingSettings,
    user_paused: bool,
    battery_active: bool,
    fullscreen_active: bool,
    cpu_active: bool,
    state: PauseState,
}

impl PauseCoordinator {
    pub fn new(settings: PausingSettings) -> Self {
        Self {
            settings,
            user_paused: false,
            battery_active: false,
            fullscreen_active: false,
            cpu_active: false,
            state: PauseState::Playing,
        }
    }

    pub fn state(&self) -> PauseState {
        self.state
    }

    /// Signal categories and thresholds are adjustable at runtime; the next
    /// recompute picks them up.
    pub fn update_settings(&mut self, settings: PausingSettings) {
        self.settings = settings;
    }

    /// Explicit user pause/unpause. Returns the new state when it changed.
    pub fn set_user_paused(&mut self, paused: bool) -> Option<PauseState> {
        self.user_paused = paused;
        self.recompute()
    }

    pub fn toggle_user_paused(&mut self) -> Option<PauseState> {
        let target = !self.user_paused;
        self.set_user_paused(target)
    }

    /// One slow-poll tick: re-read every enabled system signal and
    /// recompute. Returns the new state when it changed.
    pub fn poll(&mut self, probe: &mut dyn SignalProbe) -> Option<PauseState> {
        self.battery_active = if self.settings.battery.enabled {
            match probe.battery_percent() {
                Some(percent) => percent <= self.settings.battery.threshold_percent,
                None => false,
            }
        } else {
            false
        };

        self.fullscreen_active = if self.settings.fullscreen.enabled {
            match probe.foreground_fullscreen() {
                Some(fullscreen) => fullscreen,
                None => {
                    warn!("[PAUSE] Foreground query failed; treating as not fullscreen");
                    false
                }
            }
        } else {
            false
        };

        self.cpu_active = if self.settings.cpu.enabled {
            match probe.cpu_percent() {
                Some(percent) => percent >= self.settings.cpu.threshold_percent,
                None => false,
            }
        } else {
            false
        };

        self.recompute()
    }

    fn recompute(&mut self) -> Option<PauseState> {
        let new_state = if self.user_paused {
            PauseState::Paused(PauseReason::UserRequested)
        } else if self.battery_active {
            PauseState::Paused(PauseReason::Battery)
        } else if self.fullscreen_active {
            PauseState::Paused(PauseReason::Fullscreen)
        } else if self.cpu_active {
            PauseState::Paused(PauseReason::HighCpu)
        } else {
            PauseState::Playing
        };

        if new_state == self.state {
            return None;
        }
        self.state = new_state;
        Some(new_state)
    }
}

pub use win32::Win32SignalProbe;

mod win32 {
    use std::mem;

    use windows::Win32::{
        Foundation::{FILETIME, RECT},
        Graphics::Gdi::{
            GetMonitorInfoW, MonitorFromWindow, MONITORINFO, MONITOR_DEFAULTTONEAREST,
        },
        System::Power::GetSystemPowerStatus,
        System::Threading::GetSystemTimes,
        UI::WindowsAndMessaging::{GetClassNameW, GetForegroundWindow, GetWindowRect},
    };

    use super::SignalProbe;

    /// Signal reads backed by the Win32 power, scheduling, and window APIs.
    pub struct Win32SignalProbe {
        last_cpu_times: Option<(u64, u64, u64)>,
    }

    impl Win32SignalProbe {
        pub fn new() -> Self {
            Self {
                last_cpu_times: None,
            }
        }
    }

    impl SignalProbe for Win32SignalProbe {
        fn battery_percent(&mut self) -> Option<u8> {
            unsafe {
                let mut status = mem::zeroed();
                if GetSystemPowerStatus(&mut status).is_err() {
                    return None;
                }
                // ACLineStatus 0 = running on battery
                if status.ACLineStatus != 0 {
                    return None;
                }
                if status.BatteryLifePercent == 255 {
                    return None;
                }
                Some(status.BatteryLifePercent)
            }
        }

        fn foreground_fullscreen(&mut self) -> Option<bool> {
            unsafe {
                let foreground = GetForegroundWindow();
                if foreground.is_invalid() {
                    return Some(false);
                }

                // The shell's own desktop windows span a whole monitor; they
                // never count as a fullscreen application.
                let mut class_buf = [0u16; 64];
                let len = GetClassNameW(foreground, &mut class_buf) as usize;
                let class = String::from_utf16_lossy(&class_buf[..len]);
                if class == "Progman" || class == "WorkerW" {
                    return Some(false);
                }

                let mut window_rect = RECT::default();
                if GetWindowRect(foreground, &mut window_rect).is_err() {
                    return None;
                }

                let monitor = MonitorFromWindow(foreground, MONITOR_DEFAULTTONEAREST);
                let mut info = MONITORINFO {
                    cbSize: mem::size_of::<MONITORINFO>() as u32,
                    ..Default::default()
                };
                if !GetMonitorInfoW(monitor, &mut info).as_bool() {
                    return None;
                }

                let covers = window_rect.left <= info.rcMonitor.left
                    && window_rect.top <= info.rcMonitor.top
                    && window_rect.right >= info.rcMonitor.right
                    && window_rect.bottom >= info.rcMonitor.bottom;
                Some(covers)
            }
        }

        fn cpu_percent(&mut self) -> Option<u8> {
            unsafe {
                let mut idle = FILETIME::default();
                let mut kernel = FILETIME::default();
                let mut user = FILETIME::default();
                if GetSystemTimes(Some(&mut idle), Some(&mut kernel), Some(&mut user)).is_err() {
                    return None;
                }

                let idle = filetime_u64(idle);
                let kernel = filetime_u64(kernel);
                let user = filetime_u64(user);

                let Some(prev) = self.last_cpu_times.replace((idle, kernel, user)) else {
                    return None;
                };

                cpu_percent_from_deltas(prev, (idle, kernel, user))
            }
        }
    }

    /// Load percentage between two `(idle, kernel, user)` time samples.
    /// Kernel time includes idle time. Saturating throughout so a
    /// non-monotonic tick clamps instead of underflowing.
    pub(super) fn cpu_percent_from_deltas(
        prev: (u64, u64, u64),
        curr: (u64, u64, u64),
    ) -> Option<u8> {
        let (prev_idle, prev_kernel, prev_user) = prev;
        let (idle, kernel, user) = curr;

        let total = kernel.saturating_sub(prev_kernel) + user.saturating_sub(prev_user);
        if total == 0 {
            return None;
        }
        let busy = total.saturating_sub(idle.saturating_sub(prev_idle));
        Some(((busy * 100) / total).min(100) as u8)
    }

    fn filetime_u64(ft: FILETIME) -> u64 {
        ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loaders::config::PausingSettings;

    #[derive(Default)]
    struct FakeProbe {
        battery: Option<u8>,
        fullscreen: Option<bool>,
        cpu: Option<u8>,
    }

    impl SignalProbe for FakeProbe {
        fn battery_percent(&mut self) -> Option<u8> {
            self.battery
        }
        fn foreground_fullscreen(&mut self) -> Option<bool> {
            self.fullscreen
        }
        fn cpu_percent(&mut self) -> Option<u8> {
            self.cpu
        }
    }

    fn settings_all_enabled() -> PausingSettings {
        let mut settings = PausingSettings::default();
        settings.battery.enabled = true;
        settings.battery.threshold_percent = 25;
        settings.fullscreen.enabled = true;
        settings.cpu.enabled = true;
        settings.cpu.threshold_percent = 85;
        settings
    }

    #[test]
    fn starts_playing() {
        let coordinator = PauseCoordinator::new(settings_all_enabled());
        assert_eq!(coordinator.state(), PauseState::Playing);
    }

    #[test]
    fn user_pause_outranks_all_system_signals() {
        let mut coordinator = PauseCoordinator::new(settings_all_enabled());
        let mut probe = FakeProbe {
            battery: Some(5),
            fullscreen: Some(true),
            cpu: Some(99),
        };

        coordinator.set_user_paused(true);
        let state = coordinator.poll(&mut probe);
        // Already paused by the user; the system signals change nothing.
        assert!(state.is_none());
        assert_eq!(
            coordinator.state(),
            PauseState::Paused(PauseReason::UserRequested)
        );
    }

    #[test]
    fn battery_outranks_fullscreen_and_cpu() {
        let mut coordinator = PauseCoordinator::new(settings_all_enabled());
        let mut probe = FakeProbe {
            battery: Some(10),
            fullscreen: Some(true),
            cpu: Some(99),
        };

        let state = coordinator.poll(&mut probe).unwrap();
        assert_eq!(state, PauseState::Paused(PauseReason::Battery));
    }

    #[test]
    fn fullscreen_pauses_when_battery_is_fine() {
        let mut coordinator = PauseCoordinator::new(settings_all_enabled());
        let mut probe = FakeProbe {
            battery: Some(80),
            fullscreen: Some(true),
            cpu: Some(10),
        };

        let state = coordinator.poll(&mut probe).unwrap();
        assert_eq!(state, PauseState::Paused(PauseReason::Fullscreen));
    }

    #[test]
    fn disabled_signals_are_ignored() {
        let mut settings = settings_all_enabled();
        settings.battery.enabled = false;
        settings.fullscreen.enabled = false;
        settings.cpu.enabled = false;

        let mut coordinator = PauseCoordinator::new(settings);
        let mut probe = FakeProbe {
            battery: Some(1),
            fullscreen: Some(true),
            cpu: Some(100),
        };

        assert!(coordinator.poll(&mut probe).is_none());
        assert_eq!(coordinator.state(), PauseState::Playing);
    }

    #[test]
    fn probe_failure_reads_as_signal_false() {
        let mut coordinator = PauseCoordinator::new(settings_all_enabled());
        let mut probe = FakeProbe {
            battery: None,
            fullscreen: None,
            cpu: None,
        };

        assert!(coordinator.poll(&mut probe).is_none());
        assert_eq!(coordinator.state(), PauseState::Playing);
    }

    #[test]
    fn transitions_emit_only_on_change() {
        let mut coordinator = PauseCoordinator::new(settings_all_enabled());
        let mut probe = FakeProbe {
            battery: Some(80),
            fullscreen: Some(true),
            cpu: Some(10),
        };

        assert!(coordinator.poll(&mut probe).is_some());
        assert!(coordinator.poll(&mut probe).is_none());

        probe.fullscreen = Some(false);
        assert_eq!(coordinator.poll(&mut probe), Some(PauseState::Playing));
    }

    #[test]
    fn unpausing_user_reveals_next_priority_signal() {
        let mut coordinator = PauseCoordinator::new(settings_all_enabled());
        let mut probe = FakeProbe {
            battery: Some(10),
            fullscreen: Some(false),
            cpu: Some(10),
        };

        coordinator.poll(&mut probe);
        coordinator.set_user_paused(true);
        assert_eq!(
            coordinator.state(),
            PauseState::Paused(PauseReason::UserRequested)
        );

        let state = coordinator.set_user_paused(false).unwrap();
        assert_eq!(state, PauseState::Paused(PauseReason::Battery));
    }

    #[test]
    fn cpu_load_derives_from_time_deltas() {
        // Kernel time includes idle: 100 total, 50 idle -> 50% busy.
        assert_eq!(
            super::win32::cpu_percent_from_deltas((0, 0, 0), (50, 100, 0)),
            Some(50)
        );
        // No elapsed time yields no sample.
        assert_eq!(
            super::win32::cpu_percent_from_deltas((10, 10, 10), (10, 10, 10)),
            None
        );
        // A non-monotonic idle tick clamps to fully busy instead of
        // underflowing.
        assert_eq!(
            super::win32::cpu_percent_from_deltas((100, 100, 100), (50, 200, 150)),
            Some(100)
        );
    }

    #[test]
    fn thresholds_update_at_runtime() {
        let mut coordinator = PauseCoordinator::new(settings_all_enabled());
        let mut probe = FakeProbe {
            battery: Some(30),
            fullscreen: Some(false),
            cpu: Some(10),
        };

        assert!(coordinator.poll(&mut probe).is_none());

        let mut settings = settings_all_enabled();
        settings.battery.threshold_percent = 50;
        coordinator.update_settings(settings);

        let state = coordinator.poll(&mut probe).unwrap();
        assert_eq!(state, PauseState::Paused(PauseReason::Battery));
    }
}
