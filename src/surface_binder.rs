use crate::{
    info,
    topology::{Bounds, MonitorDescriptor},
    warn,
};

/// Opaque native window handle value. Only the operations on `ShellWindows`
/// ever interpret it.
pub type RawHandle = isize;

/// The shell's wallpaper layer materializes asynchronously after the probe
/// message, so locating it runs a bounded retry loop.
const LAYER_FIND_ATTEMPTS: u32 = 10;

/// Window-hierarchy operations the binder needs from the OS shell.
/// The production backend is `Win32Shell`; tests substitute a fake.
pub trait ShellWindows {
    /// The shell's root desktop container window.
    fn desktop_root(&mut self) -> Option<RawHandle>;

    /// Ask the shell to materialize its per-monitor wallpaper layer
    /// siblings if they do not exist yet.
    fn spawn_wallpaper_layer(&mut self, root: RawHandle);

    /// The paint-surface sibling that sits behind the icon layer.
    fn find_wallpaper_layer(&mut self) -> Option<RawHandle>;

    fn window_bounds(&mut self, handle: RawHandle) -> Option<Bounds>;

    /// Create the per-monitor host child window inside `parent`, positioned
    /// to cover `monitor_bounds` within the parent's coordinate space.
    fn create_host(
        &mut self,
        parent: RawHandle,
        parent_bounds: Bounds,
        monitor_bounds: Bounds,
    ) -> std::result::Result<RawHandle, String>;

    /// Strip focus-stealing and taskbar-visible styles and push the host to
    /// the bottom of the z-order.
    fn apply_layer_styles(&mut self, handle: RawHandle) -> std::result::Result<(), String>;

    fn destroy(&mut self, handle: RawHandle);

    /// Pause between layer-find attempts. No-op in tests.
    fn settle(&mut self) {}
}

/// One successfully bound per-monitor host. `degraded` marks the documented
/// fallback where the shell root itself is the parent and content renders
/// above the icons instead of below.
#[derive(Debug, Clone)]
pub struct BoundSurface {
    pub monitor: MonitorDescriptor,
    pub host: RawHandle,
    pub degraded: bool,
}

/// Anchors per-monitor host windows into the desktop's wallpaper layer and
/// re-anchors them when the topology changes. Owns every host window it
/// creates; never touches other processes' windows.
pub struct DesktopSurfaceBinder<S: ShellWindows> {
    shell: S,
    bound: Vec<BoundSurface>,
}

impl<S: ShellWindows> DesktopSurfaceBinder<S> {
    pub fn new(shell: S) -> Self {
        Self {
            shell,
            bound: Vec::new(),
        }
    }

    pub fn bound(&self) -> &[BoundSurface] {
        &self.bound
    }

    /// Bind one monitor. Failure is not fatal: the monitor simply shows no
    /// wallpaper until the next topology event retries it.
    pub fn bind(&mut self, monitor: &MonitorDescriptor) -> std::result::Result<RawHandle, String> {
        let root = self
            .shell
            .desktop_root()
            .ok_or_else(|| "Desktop root window not found".to_string())?;

        let (parent, degraded) = match self.locate_wallpaper_layer(root) {
            Some(layer) => (layer, false),
            None => {
                // Degraded but functional: content renders above the icons.
                warn!(
                    "[BINDER] Wallpaper layer never materialized; parenting to desktop root"
                );
                (root, true)
            }
        };

        let parent_bounds = self
            .shell
            .window_bounds(parent)
            .ok_or_else(|| "Cannot read wallpaper layer bounds".to_string())?;

        let host = self
            .shell
            .create_host(parent, parent_bounds, monitor.bounds)?;
        self.shell.apply_layer_styles(host)?;

        info!(
            "[BINDER] Bound monitor {} (degraded={})",
            monitor.id, degraded
        );
        self.bound.push(BoundSurface {
            monitor: monitor.clone(),
            host,
            degraded,
        });
        Ok(host)
    }

    /// Tear down every host and bind the given monitors fresh. Monitors
    /// that fail to bind are skipped; the rest keep their wallpaper.
    pub fn rebind_all(&mut self, monitors: &[MonitorDescriptor]) -> usize {
        self.unbind_all();

        let mut bound = 0;
        for monitor in monitors {
            match self.bind(monitor) {
                Ok(_) => bound += 1,
                Err(e) => warn!("[BINDER] Monitor {} left unbound: {}", monitor.id, e),
            }
        }
        bound
    }

    pub fn unbind(&mut self, host: RawHandle) {
        if let Some(pos) = self.bound.iter().position(|s| s.host == host) {
            let surface = self.bound.remove(pos);
            self.shell.destroy(surface.host);
        }
    }

    pub fn unbind_all(&mut self) {
        for surface in self.bound.drain(..) {
            self.shell.destroy(surface.host);
        }
    }

    fn locate_wallpaper_layer(&mut self, root: RawHandle) -> Option<RawHandle> {
        self.shell.spawn_wallpaper_layer(root);

        for attempt in 0..LAYER_FIND_ATTEMPTS {
            if let Some(layer) = self.shell.find_wallpaper_layer() {
                if attempt > 0 {
                    info!(
                        "[BINDER] Wallpaper layer appeared after {} attempt(s)",
                        attempt + 1
                    );
                }
                return Some(layer);
            }
            self.shell.settle();
        }
        None
    }
}

impl<S: ShellWindows> Drop for DesktopSurfaceBinder<S> {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

pub use win32::Win32Shell;

mod win32 {
    use std::{thread, time::Duration};

    use windows::{
        core::{w, BOOL},
        Win32::{
            Foundation::{HWND, LPARAM, WPARAM},
            UI::WindowsAndMessaging::{
                DestroyWindow, EnumWindows, FindWindowExW, FindWindowW, GetWindowLongW,
                GetWindowRect, SendMessageTimeoutW, SetWindowLongW, SetWindowPos, GWL_EXSTYLE,
                GWL_STYLE, HWND_BOTTOM, SMTO_NORMAL, SWP_FRAMECHANGED, SWP_NOACTIVATE,
                SWP_SHOWWINDOW, WS_CAPTION, WS_CHILD, WS_EX_APPWINDOW, WS_EX_DLGMODALFRAME,
                WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_WINDOWEDGE, WS_MAXIMIZEBOX,
                WS_MINIMIZEBOX, WS_SYSMENU, WS_THICKFRAME, WS_VISIBLE,
            },
        },
    };

    use super::{RawHandle, ShellWindows};
    use crate::{media_surface::create_host_window, topology::Bounds};

    /// The undocumented Progman message that makes the shell spawn its
    /// WorkerW wallpaper layer siblings.
    const WM_SPAWN_WORKERW: u32 = 0x052C;

    pub struct Win32Shell;

    impl Win32Shell {
        pub fn new() -> Self {
            Self
        }
    }

    impl ShellWindows for Win32Shell {
        fn desktop_root(&mut self) -> Option<RawHandle> {
            unsafe { FindWindowW(w!("Progman"), None).ok().map(|h| h.0 as isize) }
        }

        fn spawn_wallpaper_layer(&mut self, root: RawHandle) {
            let progman = HWND(root as *mut _);
            let mut result = 0usize;
            unsafe {
                let _ = SendMessageTimeoutW(
                    progman,
                    WM_SPAWN_WORKERW,
                    WPARAM(0xD),
                    LPARAM(0),
                    SMTO_NORMAL,
                    1000,
                    Some(&mut result),
                );
                let _ = SendMessageTimeoutW(
                    progman,
                    WM_SPAWN_WORKERW,
                    WPARAM(0xD),
                    LPARAM(1),
                    SMTO_NORMAL,
                    1000,
                    Some(&mut result),
                );
            }
        }

        fn find_wallpaper_layer(&mut self) -> Option<RawHandle> {
            // The window hosting SHELLDLL_DefView carries the desktop icons;
            // its next WorkerW sibling is the pure paint surface we want.
            let mut defview_host: Option<HWND> = None;
            unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
                let out = unsafe { (lparam.0 as *mut Option<HWND>).as_mut().unwrap() };
                if unsafe { FindWindowExW(Some(hwnd), None, w!("SHELLDLL_DefView"), None) }
                    .ok()
                    .is_some()
                {
                    *out = Some(hwnd);
                    return BOOL(0);
                }
                BOOL(1)
            }

            unsafe {
                let _ = EnumWindows(
                    Some(enum_proc),
                    LPARAM((&mut defview_host) as *mut Option<HWND> as isize),
                );

                let host = defview_host?;
                FindWindowExW(None, Some(host), w!("WorkerW"), None)
                    .ok()
                    .map(|h| h.0 as isize)
            }
        }

        fn window_bounds(&mut self, handle: RawHandle) -> Option<Bounds> {
            unsafe {
                let mut rect = Default::default();
                GetWindowRect(HWND(handle as *mut _), &mut rect)
                    .ok()
                    .map(|_| Bounds::from_rect(rect))
            }
        }

        fn create_host(
            &mut self,
            parent: RawHandle,
            parent_bounds: Bounds,
            monitor_bounds: Bounds,
        ) -> std::result::Result<RawHandle, String> {
            create_host_window(parent, parent_bounds, monitor_bounds)
        }

        fn apply_layer_styles(&mut self, handle: RawHandle) -> std::result::Result<(), String> {
            let hwnd = HWND(handle as *mut _);
            unsafe {
                let style = GetWindowLongW(hwnd, GWL_STYLE) as u32;
                let mut new_style = style
                    & !(WS_CAPTION.0
                        | WS_THICKFRAME.0
                        | WS_MINIMIZEBOX.0
                        | WS_MAXIMIZEBOX.0
                        | WS_SYSMENU.0);
                new_style |= WS_VISIBLE.0 | WS_CHILD.0;
                let _ = SetWindowLongW(hwnd, GWL_STYLE, new_style as i32);

                let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
                let mut new_ex =
                    ex_style & !(WS_EX_APPWINDOW.0 | WS_EX_WINDOWEDGE.0 | WS_EX_DLGMODALFRAME.0);
                new_ex |= WS_EX_TOOLWINDOW.0 | WS_EX_NOACTIVATE.0;
                let _ = SetWindowLongW(hwnd, GWL_EXSTYLE, new_ex as i32);

                if SetWindowPos(
                    hwnd,
                    Some(HWND_BOTTOM),
                    0,
                    0,
                    0,
                    0,
                    SWP_NOACTIVATE | SWP_SHOWWINDOW | SWP_FRAMECHANGED,
                )
                .is_err()
                {
                    return Err("SetWindowPos failed for host style".to_string());
                }
            }
            Ok(())
        }

        fn destroy(&mut self, handle: RawHandle) {
            unsafe {
                let _ = DestroyWindow(HWND(handle as *mut _));
            }
        }

        fn settle(&mut self) {
            thread::sleep(Duration::from_millis(100));
        }
    }
}
