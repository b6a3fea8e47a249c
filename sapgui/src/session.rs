use std::fmt;
use std::path::Path;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::activator;
use crate::capture::{self, WindowText};
use crate::coords;
use crate::errors::AutomationError;
use crate::input::{self, Keystroke, ScrollDirection};
use crate::locator;
use crate::platforms::{DesktopEngine, WindowId};
use crate::{CapturedState, SapSession};

/// Connection parameters for sapshcut, read from the environment at launch
/// time so credential rotation never requires a server restart.
pub struct Credentials {
    pub system: String,
    pub client: String,
    pub user: String,
    password: String,
}

// The password must never reach the logs, including via Debug formatting
// of argument lists.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("system", &self.system)
            .field("client", &self.client)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn require_env(name: &'static str) -> Result<String, AutomationError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AutomationError::MissingCredentials(name)),
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, AutomationError> {
        Ok(Self {
            system: require_env("SAP_SYSTEM")?,
            client: require_env("SAP_CLIENT")?,
            user: require_env("SAP_USER")?,
            password: require_env("SAP_PASSWORD")?,
        })
    }

    fn launcher_args(&self, transaction: &str) -> Vec<String> {
        vec![
            "-maxgui".to_string(),
            format!("-system={}", self.system),
            format!("-client={}", self.client),
            format!("-command={}", transaction),
            format!("-user={}", self.user),
            format!("-pw={}", self.password),
        ]
    }
}

/// Mutable per-session state behind the facade's mutex.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) process_pid: Option<u32>,
    pub(crate) main_window: Option<WindowId>,
    pub(crate) popup_window: Option<WindowId>,
    pub(crate) last_screenshot: Option<String>,
}

impl SapSession {
    /// Resolves the interaction target: the cached main window if its handle
    /// is still alive, otherwise any SAP window currently on screen.
    async fn target_window(&self) -> Result<WindowId, AutomationError> {
        let cached = self.state.lock().await.main_window;
        if let Some(id) = cached {
            if self.engine.is_window(id) {
                return Ok(id);
            }
            debug!(handle = id.0, "cached main window handle is stale");
        }
        match locator::find_any_sap_window(self.engine.as_ref(), &self.config)? {
            Some(id) => {
                self.state.lock().await.main_window = Some(id);
                Ok(id)
            }
            None => Err(AutomationError::WindowNotFound(
                "no SAP GUI window on screen; launch a transaction first".to_string(),
            )),
        }
    }

    /// Target resolution plus the activation ladder, shared by every
    /// interactive operation.
    async fn activated_target(&self) -> Result<WindowId, AutomationError> {
        let target = self.target_window().await?;
        activator::ensure_active(self.engine.as_ref(), &self.config, target).await?;
        Ok(target)
    }

    /// Captures the window the user is looking at. Prefers the foreground
    /// window so dialogs over the main window are what gets photographed,
    /// falling back to the given target.
    async fn capture_window(&self, fallback: WindowId) -> Result<String, AutomationError> {
        let target = self
            .engine
            .foreground_window()
            .filter(|id| self.engine.is_window(*id))
            .unwrap_or(fallback);
        let rect = self.engine.window_info(target)?.rect;
        let shot = self.engine.capture_region(rect).await?;
        let encoded = capture::png_base64(&shot)?;
        self.state.lock().await.last_screenshot = Some(encoded.clone());
        Ok(encoded)
    }

    async fn captured_state(&self, target: WindowId) -> Result<CapturedState, AutomationError> {
        let image = self.capture_window(target).await?;
        let text = capture::extract_text(self.engine.as_ref(), target)?;
        Ok(CapturedState { image, text })
    }

    pub(crate) async fn launch_inner(
        &self,
        transaction: &str,
    ) -> Result<CapturedState, AutomationError> {
        let transaction = transaction.trim();
        if transaction.is_empty() {
            return Err(AutomationError::InvalidArgument(
                "transaction code must not be empty".to_string(),
            ));
        }

        let credentials = Credentials::from_env()?;
        let install_dir = self
            .engine
            .install_path_from_registry()
            .unwrap_or_else(|| {
                debug!(
                    path = %self.config.default_install_dir.display(),
                    "registry lookup failed, using default install path"
                );
                self.config.default_install_dir.clone()
            });
        let launcher = install_dir.join(&self.config.launcher_process_name);
        if !self.engine.file_exists(&launcher) {
            return Err(AutomationError::LaunchFailure(format!(
                "{} not found at {}",
                self.config.launcher_process_name,
                launcher.display()
            )));
        }

        // A fresh launch always starts from a clean slate; stale instances
        // would otherwise satisfy the process poll below.
        let killed = self.engine.kill_by_name(&self.config.gui_process_name)
            + self.engine.kill_by_name(&self.config.launcher_process_name);
        if killed > 0 {
            info!(killed, "terminated existing SAP GUI processes");
        }
        sleep(self.config.process_cleanup_delay).await;

        self.engine
            .spawn(&launcher, &credentials.launcher_args(transaction))?;
        debug!("sapshcut launch command executed");

        let started = std::time::Instant::now();
        let pid = loop {
            if let Some(pid) = self
                .engine
                .pids_by_name(&self.config.gui_process_name)
                .first()
                .copied()
            {
                debug!(
                    pid,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "SAP GUI frontend process is up"
                );
                break pid;
            }
            if started.elapsed() >= self.config.process_start_timeout {
                return Err(AutomationError::LaunchFailure(format!(
                    "{} did not start within {:.1}s",
                    self.config.gui_process_name,
                    self.config.process_start_timeout.as_secs_f64()
                )));
            }
            sleep(self.config.process_poll_interval).await;
        };

        sleep(self.config.startup_delay).await;

        let located = locator::find_main_window(
            self.engine.as_ref(),
            &self.config,
            pid,
            self.dpi_scale,
        )
        .await
        .map_err(|e| match e {
            AutomationError::WindowNotFound(msg) => AutomationError::LaunchFailure(format!(
                "main window never appeared for transaction {transaction}: {msg}"
            )),
            other => other,
        })?;

        {
            let mut state = self.state.lock().await;
            state.process_pid = Some(pid);
            state.main_window = Some(located.main);
            state.popup_window = located.popup;
        }

        sleep(self.config.input_settle_delay).await;
        self.captured_state(located.main).await
    }

    pub(crate) async fn click_inner(
        &self,
        x: i32,
        y: i32,
    ) -> Result<CapturedState, AutomationError> {
        let target = self.activated_target().await?;
        let rect = self.engine.window_info(target)?.rect;
        let (screen_x, screen_y) = coords::to_screen(rect, x, y, self.dpi_scale, true)?;
        debug!(x, y, screen_x, screen_y, "clicking in window");

        self.engine.move_cursor(screen_x, screen_y)?;
        sleep(self.config.pre_click_delay).await;
        self.engine.click_primary()?;
        sleep(self.config.input_settle_delay).await;

        self.captured_state(target).await
    }

    pub(crate) async fn move_mouse_inner(
        &self,
        x: i32,
        y: i32,
    ) -> Result<CapturedState, AutomationError> {
        let target = self.activated_target().await?;
        let rect = self.engine.window_info(target)?.rect;
        let (screen_x, screen_y) = coords::to_screen(rect, x, y, self.dpi_scale, true)?;
        debug!(x, y, screen_x, screen_y, "moving pointer");

        self.engine.move_cursor(screen_x, screen_y)?;
        sleep(self.config.input_settle_delay).await;

        self.captured_state(target).await
    }

    pub(crate) async fn type_text_inner(
        &self,
        text: &str,
    ) -> Result<CapturedState, AutomationError> {
        let target = self.activated_target().await?;
        for keystroke in input::parse_keystrokes(text) {
            match keystroke {
                Keystroke::Text(literal) => self.engine.send_text(&literal)?,
                Keystroke::Key(key) => self.engine.press_key(key)?,
            }
        }
        sleep(self.config.input_settle_delay).await;

        self.captured_state(target).await
    }

    pub(crate) async fn scroll_inner(
        &self,
        direction: ScrollDirection,
    ) -> Result<CapturedState, AutomationError> {
        let target = self.activated_target().await?;
        let delta = match direction {
            ScrollDirection::Up => self.config.scroll_amount,
            ScrollDirection::Down => -self.config.scroll_amount,
        };
        self.engine.scroll_wheel(delta)?;
        sleep(self.config.input_settle_delay).await;

        self.captured_state(target).await
    }

    pub(crate) async fn screenshot_inner(&self) -> Result<String, AutomationError> {
        let target = self.activated_target().await?;
        self.capture_window(target).await
    }

    pub(crate) async fn window_text_inner(&self) -> Result<WindowText, AutomationError> {
        let target = self.activated_target().await?;
        capture::extract_text(self.engine.as_ref(), target)
    }

    pub(crate) async fn save_last_screenshot_inner(
        &self,
        path: &Path,
    ) -> Result<(), AutomationError> {
        let state = self.state.lock().await;
        match &state.last_screenshot {
            Some(encoded) => capture::write_base64_png(encoded, path),
            None => Err(AutomationError::CaptureFailure(
                "no screenshot has been taken in this session".to_string(),
            )),
        }
    }

    pub(crate) async fn end_session_inner(&self) -> Result<(), AutomationError> {
        let killed = self.engine.kill_by_name(&self.config.gui_process_name)
            + self.engine.kill_by_name(&self.config.launcher_process_name);
        if killed == 0 {
            warn!("end_session found no SAP GUI processes to terminate");
        } else {
            info!(killed, "SAP GUI processes terminated");
        }
        *self.state.lock().await = SessionState::default();
        Ok(())
    }
}
