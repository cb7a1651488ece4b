use std::{ptr, sync::mpsc, sync::OnceLock};

use webview2_com::Microsoft::Web::WebView2::Win32::*;
use windows::{
    core::{w, PCWSTR},
    Win32::{
        Foundation::{E_POINTER, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM},
        System::LibraryLoader::GetModuleHandleW,
        UI::WindowsAndMessaging::{
            CreateWindowExW, DefWindowProcW, GetWindowLongPtrW, RegisterClassW,
            SetWindowLongPtrW, GWLP_USERDATA, WINDOW_EX_STYLE, WINDOW_STYLE, WNDCLASSW,
            WS_CHILD, WS_CLIPCHILDREN, WS_CLIPSIBLINGS, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW,
            WS_VISIBLE,
        },
    },
};

use crate::{
    catalog::MediaItem,
    input_bridge::{unpack_pointer, WM_APP_CLICK, WM_APP_POINTER},
    playlist::MediaSurface,
    surface_binder::RawHandle,
    topology::Bounds,
    utility::{path_to_file_url, to_wstring},
    warn,
};

const HOST_CLASS_NAME: PCWSTR = w!("DeskloopHostWindow");

/// Per-host state the window proc dispatches pointer messages into.
/// Owned by the `WebViewSurface`; the window proc only borrows it through
/// `GWLP_USERDATA`, always on the window's own thread.
struct SurfaceSink {
    webview: ICoreWebView2,
    send_move: bool,
    send_click: bool,
}

/// One WebView2 controller embedded in a bound host window. Pictures,
/// video, and audio all display by navigating this surface, so showing one
/// kind inherently stops the other two.
pub struct WebViewSurface {
    host: RawHandle,
    controller: ICoreWebView2Controller,
    webview: ICoreWebView2,
    sink: *mut SurfaceSink,
}

impl WebViewSurface {
    pub fn attach(
        host: RawHandle,
        bounds: Bounds,
        send_move: bool,
        send_click: bool,
    ) -> std::result::Result<Self, String> {
        let hwnd = HWND(host as *mut _);
        let controller = create_webview_controller(hwnd, bounds)?;
        let webview = unsafe {
            controller
                .CoreWebView2()
                .map_err(|e| format!("WebView2 CoreWebView2 unavailable: {e:?}"))?
        };

        let sink = Box::into_raw(Box::new(SurfaceSink {
            webview: webview.clone(),
            send_move,
            send_click,
        }));
        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, sink as isize);
        }

        Ok(Self {
            host,
            controller,
            webview,
            sink,
        })
    }

    fn navigate(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
        if !item.path.exists() {
            return Err(format!("file missing: {}", item.path.display()));
        }

        let url = path_to_file_url(&item.path);
        let url_wide = to_wstring(&url);
        unsafe {
            self.controller
                .SetIsVisible(true)
                .map_err(|e| format!("WebView2 SetIsVisible failed: {e:?}"))?;
            self.webview
                .Navigate(PCWSTR(url_wide.as_ptr()))
                .map_err(|e| format!("WebView2 Navigate failed for '{url}': {e:?}"))
        }
    }

    fn run_script(&self, script: &str) {
        let wide = to_wstring(script);
        unsafe {
            // Best effort; script failures never propagate.
            let _ = self.webview.ExecuteScript(PCWSTR(wide.as_ptr()), None);
        }
    }
}

impl MediaSurface for WebViewSurface {
    fn show_picture(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
        self.navigate(item)
    }

    fn show_video(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
        self.navigate(item)
    }

    fn play_audio(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
        self.navigate(item)
    }

    fn hide(&mut self) {
        self.run_script("document.querySelectorAll('video,audio').forEach(m => m.pause());");
        unsafe {
            let _ = self.controller.SetIsVisible(false);
        }
    }

    fn restore(&mut self) {
        unsafe {
            let _ = self.controller.SetIsVisible(true);
        }
        self.run_script("document.querySelectorAll('video,audio').forEach(m => m.play());");
    }
}

impl Drop for WebViewSurface {
    fn drop(&mut self) {
        unsafe {
            // Detach the sink before the window proc could see a dangling
            // pointer, then reclaim it.
            SetWindowLongPtrW(HWND(self.host as *mut _), GWLP_USERDATA, 0);
            drop(Box::from_raw(self.sink));
            let _ = self.controller.Close();
        }
    }
}

/// Fans one show/hide command out to every bound monitor's surface. A show
/// succeeds when at least one surface accepted the item.
pub struct SurfaceGroup {
    pub surfaces: Vec<WebViewSurface>,
}

impl SurfaceGroup {
    pub fn new(surfaces: Vec<WebViewSurface>) -> Self {
        Self { surfaces }
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    fn fan_out(
        &mut self,
        item: &MediaItem,
        op: fn(&mut WebViewSurface, &MediaItem) -> std::result::Result<(), String>,
    ) -> std::result::Result<(), String> {
        let mut last_err = "no surfaces bound".to_string();
        let mut any_ok = false;
        for surface in &mut self.surfaces {
            match op(surface, item) {
                Ok(()) => any_ok = true,
                Err(e) => last_err = e,
            }
        }
        if any_ok {
            Ok(())
        } else {
            Err(last_err)
        }
    }
}

impl MediaSurface for SurfaceGroup {
    fn show_picture(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
        self.fan_out(item, MediaSurface::show_picture)
    }

    fn show_video(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
        self.fan_out(item, MediaSurface::show_video)
    }

    fn play_audio(&mut self, item: &MediaItem) -> std::result::Result<(), String> {
        self.fan_out(item, MediaSurface::play_audio)
    }

    fn hide(&mut self) {
        for surface in &mut self.surfaces {
            surface.hide();
        }
    }

    fn restore(&mut self) {
        for surface in &mut self.surfaces {
            surface.restore();
        }
    }
}

/// Create the per-monitor host child window inside the wallpaper layer.
pub fn create_host_window(
    parent: RawHandle,
    parent_bounds: Bounds,
    monitor_bounds: Bounds,
) -> std::result::Result<RawHandle, String> {
    ensure_host_class()?;

    let x = monitor_bounds.left - parent_bounds.left;
    let y = monitor_bounds.top - parent_bounds.top;

    let style = WINDOW_STYLE((WS_CHILD | WS_VISIBLE | WS_CLIPSIBLINGS | WS_CLIPCHILDREN).0);
    let ex_style = WINDOW_EX_STYLE((WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE).0);

    let hinstance = unsafe {
        GetModuleHandleW(None)
            .map(|h| HINSTANCE(h.0))
            .map_err(|e| format!("GetModuleHandleW failed: {e:?}"))?
    };

    let hwnd = unsafe {
        CreateWindowExW(
            ex_style,
            HOST_CLASS_NAME,
            PCWSTR::null(),
            style,
            x,
            y,
            monitor_bounds.width(),
            monitor_bounds.height(),
            Some(HWND(parent as *mut _)),
            None,
            Some(hinstance),
            Some(ptr::null()),
        )
    }
    .map_err(|e| format!("CreateWindowExW failed: {e:?}"))?;

    Ok(hwnd.0 as isize)
}

fn ensure_host_class() -> std::result::Result<(), String> {
    static CLASS_ONCE: OnceLock<bool> = OnceLock::new();
    if CLASS_ONCE.get().is_some() {
        return Ok(());
    }

    let hinstance = unsafe {
        GetModuleHandleW(None)
            .map(|h| HINSTANCE(h.0))
            .map_err(|e| format!("GetModuleHandleW failed: {e:?}"))?
    };

    let wc = WNDCLASSW {
        lpfnWndProc: Some(host_window_proc),
        hInstance: hinstance,
        lpszClassName: HOST_CLASS_NAME,
        ..Default::default()
    };

    unsafe {
        let _ = RegisterClassW(&wc);
    }

    let _ = CLASS_ONCE.set(true);
    Ok(())
}

/// Host window proc. Pointer messages posted by the sampler thread arrive
/// here on the window's own thread, in order; the packed coordinates are
/// unpacked and handed to the embedded content through a guarded script
/// call, so content without a pointer hook is unaffected.
unsafe extern "system" fn host_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_APP_POINTER || msg == WM_APP_CLICK {
        let sink = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const SurfaceSink;
        if let Some(sink) = sink.as_ref() {
            let (x, y) = unpack_pointer(lparam.0);
            let script = if msg == WM_APP_POINTER {
                if !sink.send_move {
                    return LRESULT(0);
                }
                format!(
                    "if (typeof window.deskloopPointerMove === 'function') \
                     window.deskloopPointerMove({x}, {y});"
                )
            } else {
                if !sink.send_click {
                    return LRESULT(0);
                }
                format!(
                    "if (typeof window.deskloopPointerClick === 'function') \
                     window.deskloopPointerClick({x}, {y});"
                )
            };
            let wide = to_wstring(&script);
            // Dispatch is asynchronous; a not-ready runtime or script error
            // is dropped, never surfaced to the sampler.
            let _ = sink.webview.ExecuteScript(PCWSTR(wide.as_ptr()), None);
        }
        return LRESULT(0);
    }

    DefWindowProcW(hwnd, msg, wparam, lparam)
}

fn create_webview_controller(
    hwnd: HWND,
    bounds: Bounds,
) -> std::result::Result<ICoreWebView2Controller, String> {
    let environment = {
        let (tx, rx) = mpsc::channel();

        webview2_com::CreateCoreWebView2EnvironmentCompletedHandler::wait_for_async_operation(
            Box::new(|handler| unsafe {
                CreateCoreWebView2Environment(&handler).map_err(webview2_com::Error::WindowsError)
            }),
            Box::new(move |error_code, environment| {
                error_code?;
                tx.send(environment.ok_or_else(|| windows::core::Error::from(E_POINTER)))
                    .expect("send WebView2 environment");
                Ok(())
            }),
        )
        .map_err(|e| format!("CreateCoreWebView2Environment failed: {e:?}"))?;

        rx.recv()
            .map_err(|_| "Failed to receive WebView2 environment".to_string())?
            .map_err(|e| format!("WebView2 environment unavailable: {e:?}"))?
    };

    let controller = {
        let (tx, rx) = mpsc::channel();

        webview2_com::CreateCoreWebView2ControllerCompletedHandler::wait_for_async_operation(
            Box::new(move |handler| unsafe {
                environment
                    .CreateCoreWebView2Controller(hwnd, &handler)
                    .map_err(webview2_com::Error::WindowsError)
            }),
            Box::new(move |error_code, controller| {
                error_code?;
                tx.send(controller.ok_or_else(|| windows::core::Error::from(E_POINTER)))
                    .expect("send WebView2 controller");
                Ok(())
            }),
        )
        .map_err(|e| format!("CreateCoreWebView2Controller failed: {e:?}"))?;

        rx.recv()
            .map_err(|_| "Failed to receive WebView2 controller".to_string())?
            .map_err(|e| format!("WebView2 controller unavailable: {e:?}"))?
    };

    unsafe {
        controller
            .SetBounds(RECT {
                left: 0,
                top: 0,
                right: bounds.width(),
                bottom: bounds.height(),
            })
            .map_err(|e| format!("WebView2 SetBounds failed: {e:?}"))?;

        controller
            .SetIsVisible(true)
            .map_err(|e| format!("WebView2 SetIsVisible failed: {e:?}"))?;
    }

    Ok(controller)
}

/// Build the surface set for the currently bound monitors. A monitor whose
/// controller fails to attach is logged and skipped.
pub fn attach_surfaces(
    bound: &[crate::surface_binder::BoundSurface],
    send_move: bool,
    send_click: bool,
) -> SurfaceGroup {
    let mut surfaces = Vec::new();
    for surface in bound {
        match WebViewSurface::attach(surface.host, surface.monitor.bounds, send_move, send_click) {
            Ok(webview) => surfaces.push(webview),
            Err(e) => warn!(
                "[SURFACE] Monitor {} has no media surface: {}",
                surface.monitor.id, e
            ),
        }
    }
    SurfaceGroup::new(surfaces)
}
