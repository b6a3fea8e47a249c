//! SAP GUI desktop automation
//!
//! This crate drives the SAP GUI for Windows frontend the way a human
//! operator does: launch a transaction through sapshcut, bring the window
//! to the foreground, and interact through synthesized mouse and keyboard
//! input. Every state-changing operation returns a screenshot plus the
//! text scraped from the window, so callers can see what SAP did.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument};

pub mod activator;
pub mod capture;
pub mod config;
pub mod coords;
pub mod dialog;
pub mod errors;
pub mod input;
pub mod locator;
pub mod platforms;
pub mod session;
#[cfg(test)]
mod tests;

pub use capture::WindowText;
pub use config::SessionConfig;
pub use errors::AutomationError;
pub use input::ScrollDirection;
pub use session::Credentials;

/// A window rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Holds the screenshot data
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// Raw image data (RGBA)
    pub image_data: Vec<u8>,
    /// Width of the image
    pub width: u32,
    /// Height of the image
    pub height: u32,
}

/// What an operation left on screen: a base64 PNG of the window and the
/// text scraped from it.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedState {
    pub image: String,
    pub text: WindowText,
}

/// The main entry point for SAP GUI automation
pub struct SapSession {
    pub(crate) engine: Arc<dyn platforms::DesktopEngine>,
    pub(crate) config: SessionConfig,
    pub(crate) dpi_scale: f64,
    pub(crate) state: tokio::sync::Mutex<session::SessionState>,
}

impl SapSession {
    #[instrument]
    pub fn new(config: SessionConfig) -> Result<Self, AutomationError> {
        let start = Instant::now();
        info!("Initializing SAP GUI automation session");

        let engine = platforms::create_engine()?;
        let dpi_scale = coords::dpi_scale(engine.system_dpi());

        let duration = start.elapsed();
        info!(
            duration_ms = duration.as_millis(),
            dpi_scale, "SAP GUI automation session initialized"
        );

        Ok(Self {
            engine,
            config,
            dpi_scale,
            state: tokio::sync::Mutex::new(session::SessionState::default()),
        })
    }

    /// Builds a session over a caller-supplied engine. This is how tests
    /// substitute a scripted engine for the real desktop.
    pub fn with_engine(
        engine: Arc<dyn platforms::DesktopEngine>,
        config: SessionConfig,
    ) -> Self {
        let dpi_scale = coords::dpi_scale(engine.system_dpi());
        Self {
            engine,
            config,
            dpi_scale,
            state: tokio::sync::Mutex::new(session::SessionState::default()),
        }
    }

    /// Kills prior SAP GUI processes, starts the given transaction through
    /// sapshcut with credentials from the environment, and waits for the
    /// main window, dismissing the multiple-logon popup if it appears.
    #[instrument(skip(self))]
    pub async fn launch_transaction(
        &self,
        transaction: &str,
    ) -> Result<CapturedState, AutomationError> {
        let start = Instant::now();
        info!(transaction, "Launching SAP transaction");

        let state = self.launch_inner(transaction).await?;

        let duration = start.elapsed();
        info!(
            duration_ms = duration.as_millis(),
            transaction, "SAP transaction launched"
        );
        Ok(state)
    }

    /// Clicks at window-relative logical coordinates. Coordinates are
    /// validated against the window bounds before any input is synthesized.
    #[instrument(skip(self))]
    pub async fn click_position(&self, x: i32, y: i32) -> Result<CapturedState, AutomationError> {
        let start = Instant::now();
        info!(x, y, "Clicking at position");

        let state = self.click_inner(x, y).await?;

        let duration = start.elapsed();
        info!(duration_ms = duration.as_millis(), "Click completed");
        Ok(state)
    }

    /// Moves the pointer to window-relative logical coordinates without
    /// clicking, for hover-sensitive UI like SAP tooltips and tree nodes.
    #[instrument(skip(self))]
    pub async fn move_mouse(&self, x: i32, y: i32) -> Result<CapturedState, AutomationError> {
        let start = Instant::now();
        info!(x, y, "Moving mouse to position");

        let state = self.move_mouse_inner(x, y).await?;

        let duration = start.elapsed();
        info!(duration_ms = duration.as_millis(), "Mouse move completed");
        Ok(state)
    }

    /// Types text at the current focus. Supports SendKeys-style markup:
    /// `~` or `{ENTER}` for Enter, `{TAB}`, `{F1}`..`{F16}`, arrow keys,
    /// `{ESC}`, `{BACKSPACE}`, `{DELETE}`.
    ///
    /// Example: `"Hello{TAB}World~"` types "Hello", Tab, "World", Enter.
    #[instrument(skip(self, text))]
    pub async fn type_text(&self, text: &str) -> Result<CapturedState, AutomationError> {
        let start = Instant::now();
        info!(length = text.len(), "Typing text");

        let state = self.type_text_inner(text).await?;

        let duration = start.elapsed();
        info!(duration_ms = duration.as_millis(), "Text input completed");
        Ok(state)
    }

    /// Scrolls the wheel up or down by the configured amount.
    #[instrument(skip(self))]
    pub async fn scroll_screen(
        &self,
        direction: ScrollDirection,
    ) -> Result<CapturedState, AutomationError> {
        let start = Instant::now();
        info!(?direction, "Scrolling screen");

        let state = self.scroll_inner(direction).await?;

        let duration = start.elapsed();
        info!(duration_ms = duration.as_millis(), "Scroll completed");
        Ok(state)
    }

    /// Captures the current SAP window as a base64 PNG.
    #[instrument(skip(self))]
    pub async fn screenshot(&self) -> Result<String, AutomationError> {
        let start = Instant::now();
        info!("Taking screenshot");

        let encoded = self.screenshot_inner().await?;

        let duration = start.elapsed();
        info!(
            duration_ms = duration.as_millis(),
            bytes = encoded.len(),
            "Screenshot captured"
        );
        Ok(encoded)
    }

    /// Scrapes the current window's text without synthesizing any input.
    #[instrument(skip(self))]
    pub async fn window_text(&self) -> Result<WindowText, AutomationError> {
        self.window_text_inner().await
    }

    /// Returns the most recent screenshot taken in this session, if any,
    /// as a base64 PNG.
    pub async fn last_screenshot(&self) -> Option<String> {
        self.state.lock().await.last_screenshot.clone()
    }

    /// Writes the most recent screenshot of this session to a PNG file.
    #[instrument(skip(self))]
    pub async fn save_last_screenshot(&self, path: &Path) -> Result<(), AutomationError> {
        self.save_last_screenshot_inner(path).await
    }

    /// Terminates all SAP GUI processes and forgets the cached windows.
    #[instrument(skip(self))]
    pub async fn end_session(&self) -> Result<(), AutomationError> {
        let start = Instant::now();
        info!("Ending SAP session");

        self.end_session_inner().await?;

        let duration = start.elapsed();
        info!(duration_ms = duration.as_millis(), "SAP session ended");
        Ok(())
    }
}
