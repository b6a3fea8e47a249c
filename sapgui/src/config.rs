use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one automation session.
///
/// Defaults match SAP GUI for Windows. The popup click fractions exist
/// because the multi-logon dialog has a fixed layout: the "continue with
/// this logon" option sits at the horizontal center, 38% down from the top.
/// A new SAP GUI release can move it, so the fractions are configuration,
/// not constants buried in the dialog resolver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Title substring identifying the multi-logon popup.
    pub popup_title_marker: String,
    /// Title substring identifying the SAP Logon launcher window, which is
    /// never the automation target.
    pub launcher_title_marker: String,
    /// Process image name of the SAP GUI frontend.
    pub gui_process_name: String,
    /// Process image name of the shortcut launcher used to start
    /// transactions.
    pub launcher_process_name: String,
    /// Install directory used when the registry lookup fails.
    pub default_install_dir: PathBuf,

    /// Horizontal popup click position as a fraction of popup width.
    pub popup_click_x_fraction: f64,
    /// Vertical popup click position as a fraction of popup height.
    pub popup_click_y_fraction: f64,

    /// Total time to poll for the main window after launch.
    pub window_search_timeout: Duration,
    /// Delay between window enumeration passes.
    pub window_poll_interval: Duration,
    /// Settle delay after the main window is found, to let it render.
    pub window_render_delay: Duration,

    /// Total time to poll for the GUI process after spawning the launcher.
    pub process_start_timeout: Duration,
    /// Delay between process polls.
    pub process_poll_interval: Duration,
    /// Delay after killing prior instances before relaunching.
    pub process_cleanup_delay: Duration,
    /// Delay after the GUI process appears before window search starts.
    pub startup_delay: Duration,

    /// Bounded wait per non-intrusive activation tier.
    pub activation_wait: Duration,
    /// Bounded wait after the forced-foreground tier.
    pub forced_activation_wait: Duration,
    /// Total retry budget for activating the multi-logon popup.
    pub popup_activation_timeout: Duration,
    /// Delay after a restore/maximize placement change.
    pub placement_delay: Duration,
    /// Delay after the popup is dismissed, to let it close.
    pub popup_close_delay: Duration,

    /// Delay between moving the pointer and pressing the button.
    pub pre_click_delay: Duration,
    /// Settle delay after any synthesized input, before state capture.
    pub input_settle_delay: Duration,
    /// Wheel units per scroll operation.
    pub scroll_amount: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            popup_title_marker: "License Information for Multiple Logons".to_string(),
            launcher_title_marker: "SAP Logon".to_string(),
            gui_process_name: "saplogon.exe".to_string(),
            launcher_process_name: "sapshcut.exe".to_string(),
            default_install_dir: PathBuf::from(r"C:\Program Files\SAP\FrontEnd\SAPGUI"),
            popup_click_x_fraction: 0.50,
            popup_click_y_fraction: 0.38,
            window_search_timeout: Duration::from_secs(5),
            window_poll_interval: Duration::from_millis(100),
            window_render_delay: Duration::from_secs(1),
            process_start_timeout: Duration::from_secs(5),
            process_poll_interval: Duration::from_millis(500),
            process_cleanup_delay: Duration::from_secs(1),
            startup_delay: Duration::from_secs(2),
            activation_wait: Duration::from_millis(500),
            forced_activation_wait: Duration::from_secs(1),
            popup_activation_timeout: Duration::from_secs(2),
            placement_delay: Duration::from_millis(200),
            popup_close_delay: Duration::from_secs(1),
            pre_click_delay: Duration::from_millis(200),
            input_settle_delay: Duration::from_millis(500),
            scroll_amount: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_markers_match_sap_gui() {
        let config = SessionConfig::default();
        assert!(config
            .popup_title_marker
            .contains("Multiple Logons"));
        assert_eq!(config.launcher_title_marker, "SAP Logon");
        assert_eq!(config.gui_process_name, "saplogon.exe");
    }

    #[test]
    fn config_deserializes_with_partial_overrides() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"popup_click_y_fraction": 0.42}"#).unwrap();
        assert_eq!(config.popup_click_y_fraction, 0.42);
        // everything else falls back to defaults
        assert_eq!(config.popup_click_x_fraction, 0.50);
        assert_eq!(config.scroll_amount, 5);
    }
}
