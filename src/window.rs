//! Title of the focused window, used by the active-window gate.

use std::sync::atomic::{AtomicBool, Ordering};

/// Title of the settings window.  While it has focus the engine never
/// emulates keys, so configuring a combo cannot trigger it.
pub const SETTINGS_WINDOW_TITLE: &str = "Talk to push settings";

/// Source of the focused window's title.
pub trait WindowProbe {
    /// Lowercased title of the focused window, or `""` if unknown.
    fn active_title(&self) -> String;
}

/// `true` if `title` is the settings window (case-insensitive).
pub fn is_settings_window(title: &str) -> bool {
    title.eq_ignore_ascii_case(SETTINGS_WINDOW_TITLE)
}

/// Platform window-manager query.
///
/// * Windows: `GetForegroundWindow` + `GetWindowTextW`.
/// * Linux: `xdotool getactivewindow getwindowname` (X11 only).
/// * Elsewhere: always `""`.
#[derive(Default)]
pub struct SystemWindowProbe {
    warned: AtomicBool,
}

impl SystemWindowProbe {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    fn warn_once(&self, message: &str) {
        if !self.warned.swap(true, Ordering::Relaxed) {
            log::warn!("window: {message}");
        }
    }
}

impl WindowProbe for SystemWindowProbe {
    #[cfg(target_os = "windows")]
    fn active_title(&self) -> String {
        use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW};

        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.0.is_null() {
                return String::new();
            }
            let mut buf = [0u16; 512];
            let len = GetWindowTextW(hwnd, &mut buf);
            if len <= 0 {
                return String::new();
            }
            String::from_utf16_lossy(&buf[..len as usize]).to_lowercase()
        }
    }

    #[cfg(target_os = "linux")]
    fn active_title(&self) -> String {
        use std::process::Command;

        match Command::new("xdotool")
            .args(["getactivewindow", "getwindowname"])
            .output()
        {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .trim()
                .to_lowercase(),
            Ok(_) => String::new(),
            Err(e) => {
                self.warn_once(&format!("cannot run xdotool ({e}); window filter sees no title"));
                String::new()
            }
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    fn active_title(&self) -> String {
        self.warn_once("focused window title is not available on this platform");
        String::new()
    }
}
