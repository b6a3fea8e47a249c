use std::env;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use rmcp::{schemars, schemars::JsonSchema};
use sapgui::{AutomationError, SapSession, SessionConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Shared server state. The session is created lazily on the first tool
/// call so the server can start on any machine; SAP GUI is only required
/// once a tool actually touches it.
#[derive(Clone)]
pub struct SapGuiWrapper {
    session: Arc<OnceCell<SapSession>>,
}

impl Default for SapGuiWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SapGuiWrapper {
    pub fn new() -> Self {
        Self {
            session: Arc::new(OnceCell::new()),
        }
    }

    pub async fn session(&self) -> Result<&SapSession, AutomationError> {
        self.session
            .get_or_try_init(|| async {
                info!("Initializing SAP automation session");
                SapSession::new(SessionConfig::default())
            })
            .await
    }

    /// Best-effort cleanup on server shutdown, mirroring what a human would
    /// do: close SAP when the conversation ends.
    pub async fn shutdown(&self) {
        if let Some(session) = self.session.get() {
            if let Err(e) = session.end_session().await {
                tracing::warn!(error = %e, "failed to end SAP session on shutdown");
            }
        }
    }
}

/// How a tool should return the screenshot it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenshotMode {
    /// No image in the response.
    None,
    /// Write the PNG to a file in the system temp directory.
    AsFile,
    /// Raw base64 data URI as text content.
    AsBase64,
    /// MCP image content plus the data URI as text.
    AsImageContent,
    /// Embedded resource carrying the data URI.
    #[default]
    AsImageUrl,
}

impl FromStr for ScreenshotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "as_file" => Ok(Self::AsFile),
            "as_base64" => Ok(Self::AsBase64),
            "as_imagecontent" => Ok(Self::AsImageContent),
            "as_imageurl" => Ok(Self::AsImageUrl),
            other => Err(format!(
                "invalid return_screenshot mode '{other}', expected one of: \
                 none, as_file, as_base64, as_imagecontent, as_imageurl"
            )),
        }
    }
}

impl ScreenshotMode {
    /// Resolves the optional tool argument, rejecting unknown modes before
    /// the tool does any work.
    pub fn resolve(arg: Option<&str>) -> Result<Self, String> {
        match arg {
            None => Ok(Self::default()),
            Some(raw) => raw.parse(),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct LaunchTransactionArgs {
    /// SAP transaction code to launch (e.g. VA01, ME21N, MM03).
    pub transaction: String,
    /// Screenshot return mode: none, as_file, as_base64, as_imagecontent
    /// or as_imageurl (default).
    pub return_screenshot: Option<String>,
}

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct ClickArgs {
    /// Horizontal pixel coordinate inside the SAP window.
    pub x: i32,
    /// Vertical pixel coordinate inside the SAP window.
    pub y: i32,
    /// Screenshot return mode: none, as_file, as_base64, as_imagecontent
    /// or as_imageurl (default).
    pub return_screenshot: Option<String>,
}

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct MoveMouseArgs {
    /// Horizontal pixel coordinate inside the SAP window.
    pub x: i32,
    /// Vertical pixel coordinate inside the SAP window.
    pub y: i32,
    /// Screenshot return mode: none, as_file, as_base64, as_imagecontent
    /// or as_imageurl (default).
    pub return_screenshot: Option<String>,
}

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct TypeTextArgs {
    /// Text to type at the current cursor position. Supports SendKeys-style
    /// markup: ~ or {ENTER}, {TAB}, {F1}-{F16}, {UP}, {DOWN}, {LEFT},
    /// {RIGHT}, {ESC}, {BACKSPACE}, {DELETE}.
    pub text: String,
    /// Screenshot return mode: none, as_file, as_base64, as_imagecontent
    /// or as_imageurl (default).
    pub return_screenshot: Option<String>,
}

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct ScrollArgs {
    /// Direction to scroll: "up" or "down".
    pub direction: String,
    /// Screenshot return mode: none, as_file, as_base64, as_imagecontent
    /// or as_imageurl (default).
    pub return_screenshot: Option<String>,
}

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct SaveScreenshotArgs {
    /// Path where the screenshot will be saved (e.g. 'screenshot.png').
    pub filename: String,
}

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct EmptyArgs {}

pub fn init_logging() -> Result<()> {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    Ok(())
}
