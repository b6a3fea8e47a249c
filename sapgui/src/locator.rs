use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dialog;
use crate::errors::AutomationError;
use crate::platforms::{DesktopEngine, WindowId};

/// Outcome of one launch-time window search.
#[derive(Debug, Clone, Copy)]
pub struct LocatedWindows {
    pub main: WindowId,
    /// Set when the multiple-logon popup appeared and was dismissed during
    /// the search.
    pub popup: Option<WindowId>,
}

/// Polls for the main SAP GUI window of the given process, dismissing the
/// multiple-logon popup inline if it shows up first.
///
/// One enumeration pass can see the popup, the main window, both, or
/// neither; the popup is always resolved before the pass concludes so the
/// main window is interactable by the time it is returned. The launcher
/// window ("SAP Logon") is never a valid target.
pub async fn find_main_window(
    engine: &dyn DesktopEngine,
    config: &SessionConfig,
    pid: u32,
    dpi_scale: f64,
) -> Result<LocatedWindows, AutomationError> {
    let start = Instant::now();
    let mut seen_popup = None;

    while start.elapsed() < config.window_search_timeout {
        let mut main = None;
        for window in engine.list_top_level_windows()? {
            if !window.visible || window.pid != pid || window.title.is_empty() {
                continue;
            }
            debug!(title = %window.title, handle = window.id.0, "checking window");

            if window.title.contains(&config.popup_title_marker) {
                if seen_popup != Some(window.id) {
                    dialog::resolve_multi_logon(engine, config, window.id, dpi_scale).await?;
                    seen_popup = Some(window.id);
                }
                continue;
            }
            if window.title.contains(&config.launcher_title_marker) {
                debug!(title = %window.title, "skipping launcher window");
                continue;
            }
            main = Some(window);
        }

        if let Some(window) = main {
            info!(title = %window.title, "found main SAP GUI window");
            sleep(config.window_render_delay).await;
            return Ok(LocatedWindows {
                main: window.id,
                popup: seen_popup,
            });
        }
        sleep(config.window_poll_interval).await;
    }

    warn!(
        timeout_secs = config.window_search_timeout.as_secs_f64(),
        "window search timed out"
    );
    Err(AutomationError::WindowNotFound(format!(
        "no main window for process {pid} within {:.1}s",
        config.window_search_timeout.as_secs_f64()
    )))
}

/// Finds any SAP GUI window owned by the frontend process, preferring the
/// one currently in the foreground. Used as the fallback when the cached
/// main-window handle has gone stale.
pub fn find_any_sap_window(
    engine: &dyn DesktopEngine,
    config: &SessionConfig,
) -> Result<Option<WindowId>, AutomationError> {
    let sap_pids = engine.pids_by_name(&config.gui_process_name);
    if sap_pids.is_empty() {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    for window in engine.list_top_level_windows()? {
        if !window.visible || !sap_pids.contains(&window.pid) {
            continue;
        }
        if window.title.contains(&config.launcher_title_marker) {
            debug!(title = %window.title, "skipping launcher window");
            continue;
        }
        debug!(title = %window.title, handle = window.id.0, "SAP window candidate");
        candidates.push(window.id);
    }

    if let Some(foreground) = engine.foreground_window() {
        if candidates.contains(&foreground) {
            debug!("using the foreground SAP window");
            return Ok(Some(foreground));
        }
    }
    Ok(candidates.first().copied())
}
