use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use windows::Win32::{
    Foundation::{HWND, LPARAM, POINT, WPARAM},
    UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON},
    UI::WindowsAndMessaging::{GetCursorPos, PostMessageW, WM_APP},
};

use crate::{surface_binder::RawHandle, topology::Bounds, warn};

/// Surface-local pointer position, x in the low word and y in the high word
/// of the lparam.
pub const WM_APP_POINTER: u32 = WM_APP + 1;
/// Left-button press at the packed surface-local position.
pub const WM_APP_CLICK: u32 = WM_APP + 2;

#[derive(Debug, Clone)]
pub struct PointerTarget {
    pub host: RawHandle,
    pub bounds: Bounds,
}

/// Samples the global pointer on a fixed-period timer thread and posts the
/// surface-local position into the owning host window's message queue. The
/// handoff through the queue keeps all dispatch into the embedded runtime
/// on the surface's own thread, in arrival order; the sampler never calls
/// across the context boundary itself.
pub struct InputBridge {
    running: Arc<AtomicBool>,
    targets: Arc<Mutex<Vec<PointerTarget>>>,
    worker: Option<JoinHandle<()>>,
}

impl InputBridge {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            targets: Arc::new(Mutex::new(Vec::new())),
            worker: None,
        }
    }

    /// Swap the forwarding targets, e.g. after a rebind. Takes effect on
    /// the sampler's next tick.
    pub fn set_targets(&self, targets: Vec<PointerTarget>) {
        *self.targets.lock().unwrap() = targets;
    }

    pub fn start(&mut self, poll_interval: Duration) {
        if self.worker.is_some() {
            return;
        }
        self.running.store(true, Ordering::Relaxed);

        let running = Arc::clone(&self.running);
        let targets = Arc::clone(&self.targets);
        self.worker = Some(thread::spawn(move || {
            let mut last_cursor: Option<(i32, i32)> = None;
            let mut last_left_down = false;

            while running.load(Ordering::Relaxed) {
                sample_once(&targets, &mut last_cursor, &mut last_left_down);
                thread::sleep(poll_interval);
            }
        }));
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("[INPUT] Sampler thread panicked during shutdown");
            }
        }
    }
}

impl Drop for InputBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_once(
    targets: &Mutex<Vec<PointerTarget>>,
    last_cursor: &mut Option<(i32, i32)>,
    last_left_down: &mut bool,
) {
    let mut point = POINT::default();
    unsafe {
        if GetCursorPos(&mut point).is_err() {
            return;
        }
    }

    let cursor = (point.x, point.y);
    let left_down = unsafe { (GetAsyncKeyState(VK_LBUTTON.0 as i32) as u16 & 0x8000) != 0 };
    let moved = last_cursor.map(|p| p != cursor).unwrap_or(true);
    let just_pressed = left_down && !*last_left_down;
    *last_cursor = Some(cursor);
    *last_left_down = left_down;

    if !moved && !just_pressed {
        return;
    }

    let targets = targets.lock().unwrap();
    for target in targets.iter() {
        let Some((local_x, local_y)) = surface_local(cursor, target.bounds) else {
            continue;
        };
        let packed = LPARAM(pack_pointer(local_x, local_y));
        let hwnd = HWND(target.host as *mut _);
        unsafe {
            // Best effort: a full queue or destroyed host just drops the
            // update; the next tick posts a fresh one.
            if moved {
                let _ = PostMessageW(Some(hwnd), WM_APP_POINTER, WPARAM(0), packed);
            }
            if just_pressed {
                let _ = PostMessageW(Some(hwnd), WM_APP_CLICK, WPARAM(0), packed);
            }
        }
    }
}

/// Global cursor position to surface-local client coordinates; `None` when
/// the cursor is outside the surface.
pub fn surface_local(cursor: (i32, i32), bounds: Bounds) -> Option<(i32, i32)> {
    if !bounds.contains(cursor.0, cursor.1) {
        return None;
    }
    Some((cursor.0 - bounds.left, cursor.1 - bounds.top))
}

/// Pack surface-local coordinates into one message integer: x in the low
/// 16 bits, y in the high 16 bits.
pub fn pack_pointer(x: i32, y: i32) -> isize {
    let x = x.clamp(0, 0xFFFF) as isize;
    let y = y.clamp(0, 0xFFFF) as isize;
    (y << 16) | x
}

pub fn unpack_pointer(packed: isize) -> (i32, i32) {
    let x = (packed & 0xFFFF) as i32;
    let y = ((packed >> 16) & 0xFFFF) as i32;
    (x, y)
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
    fn pointer_round_trips_through_packing() {
        for (x, y) in [(0, 0), (1919, 1079), (640, 480), (0xFFFF, 0xFFFF)] {
            assert_eq!(unpack_pointer(pack_pointer(x, y)), (x, y));
        }
    }

    #[test]
    fn packing_clamps_out_of_range_coordinates() {
        assert_eq!(unpack_pointer(pack_pointer(-5, 70000)), (0, 0xFFFF));
    }

    #[test]
    fn surface_local_translates_into_client_space() {
        let b = bounds(1920, 0, 3840, 1080);
        assert_eq!(surface_local((1920, 0), b), Some((0, 0)));
        assert_eq!(surface_local((2560, 500), b), Some((640, 500)));
    }

    #[test]
    fn surface_local_rejects_positions_outside_the_surface() {
        let b = bounds(0, 0, 1920, 1080);
        assert_eq!(surface_local((1920, 0), b), None);
        assert_eq!(surface_local((-1, 5), b), None);
    }

    #[test]
    fn negative_origin_monitors_map_correctly() {
        let b = bounds(-1920, 0, 0, 1080);
        assert_eq!(surface_local((-1920, 10), b), Some((0, 10)));
        assert_eq!(surface_local((-1, 10), b), Some((1919, 10)));
    }
}
