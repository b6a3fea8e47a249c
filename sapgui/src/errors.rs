use thiserror::Error;

/// Errors surfaced by the automation core.
///
/// Failed foreground activation is deliberately absent: it is a logged
/// warning, not an error, and operations proceed best-effort after it.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The launcher binary is missing, the process never started, or the
    /// main window never appeared within the search timeout.
    #[error("Failed to launch SAP GUI: {0}")]
    LaunchFailure(String),

    /// No valid cached or discoverable target window for an interactive
    /// operation.
    #[error("No SAP GUI window found: {0}")]
    WindowNotFound(String),

    /// Logical coordinates fell outside the window rectangle while bounds
    /// checking was requested.
    #[error("Coordinates ({x}, {y}) are outside window bounds ({width}x{height})")]
    BoundsError {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },

    /// Screenshot could not be taken (e.g. no active window).
    #[error("Failed to capture screenshot: {0}")]
    CaptureFailure(String),

    /// Malformed caller-supplied argument, reported before any side effect.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required credential environment variable is unset or empty.
    #[error("Missing required credential environment variable: {0}")]
    MissingCredentials(&'static str),

    /// An OS-level call failed.
    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}
