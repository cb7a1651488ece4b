use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE},
        System::Threading::{CreateMutexW, ReleaseMutex},
    },
};

use crate::utility::to_wstring;

const LOCK_NAME: &str = "DeskloopWallpaperEngine";

/// Process-wide exclusive instance lock backed by a named Win32 mutex.
/// Acquired exactly once at startup; released on drop.
pub struct InstanceLock {
    handle: HANDLE,
}

impl InstanceLock {
    pub fn acquire() -> std::result::Result<Self, String> {
        let name = to_wstring(LOCK_NAME);
        unsafe {
            let handle = CreateMutexW(None, true, PCWSTR(name.as_ptr()))
                .map_err(|e| format!("CreateMutexW failed: {e:?}"))?;

            if GetLastError() == ERROR_ALREADY_EXISTS {
                let _ = CloseHandle(handle);
                return Err("Another Deskloop instance is already running".to_string());
            }

            Ok(Self { handle })
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        unsafe {
            let _ = ReleaseMutex(self.handle);
            let _ = CloseHandle(self.handle);
        }
    }
}
