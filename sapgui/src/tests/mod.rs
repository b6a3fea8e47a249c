mod locator_tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::errors::AutomationError;
use crate::platforms::{DesktopEngine, Key, Placement, WindowId, WindowInfo};
use crate::{Rect, ScreenshotResult};

/// Serializes tests that mutate SAP_* environment variables.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// A config with all waits collapsed so poll loops run in milliseconds.
pub fn fast_config() -> SessionConfig {
    let tick = Duration::from_millis(1);
    SessionConfig {
        window_search_timeout: Duration::from_millis(50),
        window_poll_interval: tick,
        window_render_delay: tick,
        process_start_timeout: Duration::from_millis(50),
        process_poll_interval: tick,
        process_cleanup_delay: tick,
        startup_delay: tick,
        activation_wait: Duration::from_millis(5),
        forced_activation_wait: Duration::from_millis(5),
        popup_activation_timeout: Duration::from_millis(20),
        placement_delay: tick,
        popup_close_delay: tick,
        pre_click_delay: tick,
        input_settle_delay: tick,
        ..SessionConfig::default()
    }
}

pub fn window(id: u64, title: &str, pid: u32, rect: Rect) -> WindowInfo {
    WindowInfo {
        id: WindowId(id),
        title: title.to_string(),
        pid,
        rect,
        placement: Placement::Normal,
        visible: true,
    }
}

pub fn default_rect() -> Rect {
    Rect {
        x: 0,
        y: 0,
        width: 1024,
        height: 768,
    }
}

/// Everything the engine did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Restore(u64),
    Maximize(u64),
    BringToTop(u64),
    PostActivation(u64),
    ForceForeground(u64),
    MoveCursor(i32, i32),
    Click,
    Scroll(i32),
    Text(String),
    Key(Key),
    Spawn(String, Vec<String>),
    Kill(String),
}

/// Which activation tier the fake window manager honors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantTier {
    BringToTop,
    PostMessages,
    ForceForeground,
    Never,
}

#[derive(Default)]
pub struct MockState {
    pub windows: Vec<WindowInfo>,
    pub children: HashMap<u64, Vec<WindowInfo>>,
    pub foreground: Option<WindowId>,
    /// Windows removed when Enter is pressed (the popup closing).
    pub remove_after_enter: Vec<WindowId>,
    /// Windows that appear when Enter is pressed (the main window after
    /// the popup).
    pub appear_after_enter: Vec<WindowInfo>,
    /// Process name -> pids currently "running".
    pub pids: HashMap<String, Vec<u32>>,
    /// Process name -> pid registered once spawn is called, simulating
    /// sapshcut starting saplogon.
    pub spawn_registers: Option<(String, u32)>,
    pub launcher_exists: bool,
    pub dpi: Option<u32>,
    pub registry_path: Option<PathBuf>,
}

/// Scripted desktop used by locator and session tests.
pub struct MockEngine {
    pub state: Mutex<MockState>,
    pub actions: Mutex<Vec<Action>>,
    pub grant_on: GrantTier,
}

impl MockEngine {
    pub fn new(state: MockState, grant_on: GrantTier) -> Self {
        Self {
            state: Mutex::new(state),
            actions: Mutex::new(Vec::new()),
            grant_on,
        }
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }

    fn find(&self, id: WindowId) -> Option<WindowInfo> {
        let state = self.state.lock().unwrap();
        state
            .windows
            .iter()
            .chain(state.children.values().flatten())
            .find(|w| w.id == id)
            .cloned()
    }
}

#[async_trait::async_trait]
impl DesktopEngine for MockEngine {
    fn list_top_level_windows(&self) -> Result<Vec<WindowInfo>, AutomationError> {
        Ok(self.state.lock().unwrap().windows.clone())
    }

    fn list_child_windows(&self, parent: WindowId) -> Result<Vec<WindowInfo>, AutomationError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .children
            .get(&parent.0)
            .cloned()
            .unwrap_or_default())
    }

    fn is_window(&self, id: WindowId) -> bool {
        self.find(id).is_some()
    }

    fn window_info(&self, id: WindowId) -> Result<WindowInfo, AutomationError> {
        self.find(id).ok_or_else(|| {
            AutomationError::WindowNotFound(format!("handle {:#x} is no longer valid", id.0))
        })
    }

    fn foreground_window(&self) -> Option<WindowId> {
        self.state.lock().unwrap().foreground
    }

    fn restore(&self, id: WindowId) -> Result<(), AutomationError> {
        self.record(Action::Restore(id.0));
        let mut state = self.state.lock().unwrap();
        if let Some(w) = state.windows.iter_mut().find(|w| w.id == id) {
            w.placement = Placement::Normal;
        }
        Ok(())
    }

    fn maximize(&self, id: WindowId) -> Result<(), AutomationError> {
        self.record(Action::Maximize(id.0));
        let mut state = self.state.lock().unwrap();
        if let Some(w) = state.windows.iter_mut().find(|w| w.id == id) {
            w.placement = Placement::Maximized;
        }
        Ok(())
    }

    fn bring_to_top(&self, id: WindowId) -> Result<(), AutomationError> {
        self.record(Action::BringToTop(id.0));
        if self.grant_on == GrantTier::BringToTop {
            self.state.lock().unwrap().foreground = Some(id);
        }
        Ok(())
    }

    fn post_activation(&self, id: WindowId) -> Result<(), AutomationError> {
        self.record(Action::PostActivation(id.0));
        if self.grant_on == GrantTier::PostMessages {
            self.state.lock().unwrap().foreground = Some(id);
        }
        Ok(())
    }

    fn force_foreground(&self, id: WindowId) -> Result<(), AutomationError> {
        self.record(Action::ForceForeground(id.0));
        if self.grant_on == GrantTier::ForceForeground {
            self.state.lock().unwrap().foreground = Some(id);
        }
        Ok(())
    }

    fn move_cursor(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        self.record(Action::MoveCursor(x, y));
        Ok(())
    }

    fn click_primary(&self) -> Result<(), AutomationError> {
        self.record(Action::Click);
        Ok(())
    }

    fn scroll_wheel(&self, delta: i32) -> Result<(), AutomationError> {
        self.record(Action::Scroll(delta));
        Ok(())
    }

    fn send_text(&self, text: &str) -> Result<(), AutomationError> {
        self.record(Action::Text(text.to_string()));
        Ok(())
    }

    fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        self.record(Action::Key(key));
        if key == Key::Enter {
            let mut state = self.state.lock().unwrap();
            let gone = std::mem::take(&mut state.remove_after_enter);
            state.windows.retain(|w| !gone.contains(&w.id));
            let appearing = std::mem::take(&mut state.appear_after_enter);
            state.windows.extend(appearing);
        }
        Ok(())
    }

    async fn capture_region(&self, rect: Rect) -> Result<ScreenshotResult, AutomationError> {
        let width = rect.width.max(1) as u32;
        let height = rect.height.max(1) as u32;
        Ok(ScreenshotResult {
            image_data: vec![0u8; (width * height * 4) as usize],
            width,
            height,
        })
    }

    fn system_dpi(&self) -> Option<u32> {
        self.state.lock().unwrap().dpi
    }

    fn pids_by_name(&self, name: &str) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .pids
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn kill_by_name(&self, name: &str) -> usize {
        self.record(Action::Kill(name.to_string()));
        self.state
            .lock()
            .unwrap()
            .pids
            .remove(name)
            .map(|pids| pids.len())
            .unwrap_or(0)
    }

    fn spawn(&self, path: &Path, args: &[String]) -> Result<u32, AutomationError> {
        self.record(Action::Spawn(
            path.display().to_string(),
            args.to_vec(),
        ));
        let mut state = self.state.lock().unwrap();
        if let Some((name, pid)) = state.spawn_registers.clone() {
            state.pids.entry(name).or_default().push(pid);
        }
        Ok(4242)
    }

    fn install_path_from_registry(&self) -> Option<PathBuf> {
        self.state.lock().unwrap().registry_path.clone()
    }

    fn file_exists(&self, _path: &Path) -> bool {
        self.state.lock().unwrap().launcher_exists
    }
}
