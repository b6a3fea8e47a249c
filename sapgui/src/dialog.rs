use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::coords;
use crate::errors::AutomationError;
use crate::platforms::{DesktopEngine, Key, WindowId};

/// Dismisses the "License Information for Multiple Logons" popup by taking
/// the continue-without-ending-other-sessions option.
///
/// The popup is a plain dialog with no child controls worth enumerating, so
/// the option is hit positionally: a fraction of the popup's size, with
/// bounds checking off because the reported rect can lag the rendered
/// dialog while it is still animating in.
pub async fn resolve_multi_logon(
    engine: &dyn DesktopEngine,
    config: &SessionConfig,
    popup: WindowId,
    dpi_scale: f64,
) -> Result<(), AutomationError> {
    info!("handling multiple-logon popup");

    // The popup ignores the polite activation tiers, so go straight to the
    // forced foreground and retry until it sticks.
    let start = Instant::now();
    let mut activated = false;
    while start.elapsed() < config.popup_activation_timeout {
        engine.force_foreground(popup)?;
        if engine.foreground_window() == Some(popup) {
            activated = true;
            break;
        }
        sleep(config.window_poll_interval).await;
    }
    if !activated {
        warn!("multiple-logon popup did not come to the foreground, clicking anyway");
    }
    sleep(config.placement_delay).await;

    let rect = engine.window_info(popup)?.rect;
    let click_x = (f64::from(rect.width) * config.popup_click_x_fraction) as i32;
    let click_y = (f64::from(rect.height) * config.popup_click_y_fraction) as i32;
    debug!(
        click_x,
        click_y,
        width = rect.width,
        height = rect.height,
        "clicking logon option in popup"
    );

    let (screen_x, screen_y) = coords::to_screen(rect, click_x, click_y, dpi_scale, false)?;
    engine.move_cursor(screen_x, screen_y)?;
    sleep(config.pre_click_delay).await;
    engine.click_primary()?;
    sleep(config.input_settle_delay).await;

    engine.press_key(Key::Enter)?;
    sleep(config.popup_close_delay).await;

    info!("multiple-logon popup handled");
    Ok(())
}
