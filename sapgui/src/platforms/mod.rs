use crate::errors::AutomationError;
use crate::{Rect, ScreenshotResult};
use std::path::{Path, PathBuf};

#[cfg(target_os = "windows")]
pub mod windows;

/// Opaque handle to a top-level or child window.
///
/// On Windows this wraps the HWND value. Handles can go stale at any time;
/// callers revalidate with [`DesktopEngine::is_window`] before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// Show state of a window, as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Normal,
    Minimized,
    Maximized,
}

/// Snapshot of one window at enumeration time.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub pid: u32,
    pub rect: Rect,
    pub placement: Placement,
    pub visible: bool,
}

/// Named non-character keys that can be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
    Escape,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    /// F1 through F16.
    Function(u8),
}

/// The OS-facing capability seam.
///
/// Everything above this trait is platform-independent and testable with a
/// scripted fake. The trait is deliberately narrow: enumeration, placement,
/// activation, raw input, capture, and process control. No accessibility
/// tree, no per-control addressing.
#[async_trait::async_trait]
pub trait DesktopEngine: Send + Sync {
    // Window enumeration and inspection.
    fn list_top_level_windows(&self) -> Result<Vec<WindowInfo>, AutomationError>;
    fn list_child_windows(&self, parent: WindowId) -> Result<Vec<WindowInfo>, AutomationError>;
    fn is_window(&self, id: WindowId) -> bool;
    fn window_info(&self, id: WindowId) -> Result<WindowInfo, AutomationError>;
    fn foreground_window(&self) -> Option<WindowId>;

    // Placement.
    fn restore(&self, id: WindowId) -> Result<(), AutomationError>;
    fn maximize(&self, id: WindowId) -> Result<(), AutomationError>;

    // Activation tiers, least to most intrusive.
    fn bring_to_top(&self, id: WindowId) -> Result<(), AutomationError>;
    fn post_activation(&self, id: WindowId) -> Result<(), AutomationError>;
    fn force_foreground(&self, id: WindowId) -> Result<(), AutomationError>;

    // Synthesized input. All of these act on the current pointer position or
    // the focused window, matching how a human drives the GUI.
    fn move_cursor(&self, x: i32, y: i32) -> Result<(), AutomationError>;
    fn click_primary(&self) -> Result<(), AutomationError>;
    fn scroll_wheel(&self, delta: i32) -> Result<(), AutomationError>;
    fn send_text(&self, text: &str) -> Result<(), AutomationError>;
    fn press_key(&self, key: Key) -> Result<(), AutomationError>;

    // Capture.
    async fn capture_region(&self, rect: Rect) -> Result<ScreenshotResult, AutomationError>;
    fn system_dpi(&self) -> Option<u32>;

    // Process control.
    fn pids_by_name(&self, name: &str) -> Vec<u32>;
    fn kill_by_name(&self, name: &str) -> usize;
    fn spawn(&self, path: &Path, args: &[String]) -> Result<u32, AutomationError>;
    fn install_path_from_registry(&self) -> Option<PathBuf>;

    /// Overridable so tests can script launcher presence without touching
    /// the filesystem.
    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Builds the engine for the current OS.
pub fn create_engine() -> Result<std::sync::Arc<dyn DesktopEngine>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(std::sync::Arc::new(windows::WindowsEngine::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(format!(
            "SAP GUI automation requires Windows, found {}",
            std::env::consts::OS
        )))
    }
}
