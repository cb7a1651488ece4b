use std::{mem, sync::Arc};

use windows::{
    core::BOOL,
    Win32::{
        Foundation::{LPARAM, RECT},
        Graphics::Gdi::{
            EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW,
        },
        UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI},
        UI::WindowsAndMessaging::MONITORINFOF_PRIMARY,
    },
};

use crate::warn;

/// Virtual-screen rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn from_rect(rect: RECT) -> Self {
        Self {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn of(bounds: &Bounds) -> Self {
        if bounds.height() > bounds.width() {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

/// Immutable per-monitor snapshot entry. Never mutated in place; the whole
/// topology snapshot is replaced on change.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorDescriptor {
    pub id: String,
    pub bounds: Bounds,
    pub work_area: Bounds,
    pub dpi_scale: f64,
    pub is_primary: bool,
    pub orientation: Orientation,
}

impl MonitorDescriptor {
    pub fn new(id: &str, bounds: Bounds, work_area: Bounds, dpi_scale: f64, is_primary: bool) -> Self {
        Self {
            id: id.to_string(),
            orientation: Orientation::of(&bounds),
            bounds,
            work_area,
            dpi_scale,
            is_primary,
        }
    }
}

/// The current set of connected monitors. Readers hold an `Arc` to a
/// consistent snapshot; `refresh()` swaps in a new one wholesale.
pub struct DisplayTopology {
    snapshot: Arc<Vec<MonitorDescriptor>>,
}

impl DisplayTopology {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(enumerate_monitors()),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<MonitorDescriptor>> {
        Arc::clone(&self.snapshot)
    }

    /// Re-enumerate and report whether the topology changed. The previous
    /// snapshot stays alive for readers still holding it.
    pub fn refresh(&mut self) -> bool {
        let fresh = enumerate_monitors();
        if *self.snapshot == fresh {
            return false;
        }
        warn!(
            "[TOPOLOGY] Layout changed: {} monitor(s) now connected",
            fresh.len()
        );
        self.snapshot = Arc::new(fresh);
        true
    }
}

fn enumerate_monitors() -> Vec<MonitorDescriptor> {
    unsafe extern "system" fn enum_monitor_proc(
        monitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let vec = &mut *(lparam.0 as *mut Vec<MonitorDescriptor>);

        let mut info: MONITORINFOEXW = mem::zeroed();
        info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;

        if GetMonitorInfoW(monitor, &mut info as *mut MONITORINFOEXW as *mut _).as_bool() {
            let id_len = info
                .szDevice
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(info.szDevice.len());
            let id = String::from_utf16_lossy(&info.szDevice[..id_len]);

            let mut dpi_x = 96u32;
            let mut dpi_y = 96u32;
            if GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y).is_err() {
                dpi_x = 96;
            }

            vec.push(MonitorDescriptor::new(
                &id,
                Bounds::from_rect(info.monitorInfo.rcMonitor),
                Bounds::from_rect(info.monitorInfo.rcWork),
                dpi_x as f64 / 96.0,
                info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
            ));
        }

        BOOL(1)
    }

    let mut monitors = Vec::<MonitorDescriptor>::new();
    unsafe {
        let _ = EnumDisplayMonitors(
            None,
            None,
            Some(enum_monitor_proc),
            LPARAM((&mut monitors as *mut Vec<MonitorDescriptor>) as isize),
        );
    }

    monitors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(left: i32, top: i32, right: i32, bottom: i32) -> Bounds {
        Bounds {
            left,
            top,
            right,
            bottom,
        }
    }

    #[test]
    fn bounds_geometry() {
        let b = bounds(-1920, 0, 0, 1080);
        assert_eq!(b.width(), 1920);
        assert_eq!(b.height(), 1080);
        assert!(b.contains(-1, 0));
        assert!(!b.contains(0, 0));
        assert!(!b.contains(-1, 1080));
    }

    #[test]
    fn orientation_derived_from_bounds() {
        assert_eq!(
            Orientation::of(&bounds(0, 0, 1920, 1080)),
            Orientation::Landscape
        );
        assert_eq!(
            Orientation::of(&bounds(0, 0, 1080, 1920)),
            Orientation::Portrait
        );
        // Square counts as landscape.
        assert_eq!(
            Orientation::of(&bounds(0, 0, 1000, 1000)),
            Orientation::Landscape
        );
    }

    #[test]
    fn descriptors_compare_structurally() {
        let a = MonitorDescriptor::new(
            r"\\.\DISPLAY1",
            bounds(0, 0, 2560, 1440),
            bounds(0, 0, 2560, 1400),
            1.25,
            true,
        );
        let b = a.clone();
        assert_eq!(a, b);

        let moved = MonitorDescriptor::new(
            r"\\.\DISPLAY1",
            bounds(100, 0, 2660, 1440),
            bounds(100, 0, 2660, 1400),
            1.25,
            true,
        );
        assert_ne!(a, moved);
    }
}
