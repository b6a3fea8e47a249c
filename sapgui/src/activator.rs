use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::errors::AutomationError;
use crate::platforms::{DesktopEngine, Placement, WindowId};

/// Escalation ladder for bringing the SAP window to the foreground,
/// least intrusive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationTier {
    BringToTop,
    PostMessages,
    ForcedForeground,
}

/// Result of an activation attempt. Activation failure is not an error:
/// input synthesis still mostly works against a non-foreground SAP window,
/// so callers proceed after a warning rather than aborting the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated(ActivationTier),
    WarnedNotActivated,
}

async fn wait_for_foreground(
    engine: &dyn DesktopEngine,
    config: &SessionConfig,
    window: WindowId,
    budget: std::time::Duration,
) -> bool {
    let start = Instant::now();
    loop {
        if engine.foreground_window() == Some(window) {
            return true;
        }
        if start.elapsed() >= budget {
            return false;
        }
        sleep(config.window_poll_interval).await;
    }
}

/// Restores, maximizes, and foregrounds the window, escalating through the
/// three tiers until one takes effect.
pub async fn ensure_active(
    engine: &dyn DesktopEngine,
    config: &SessionConfig,
    window: WindowId,
) -> Result<ActivationOutcome, AutomationError> {
    let info = engine.window_info(window)?;
    if info.placement == Placement::Minimized {
        debug!(title = %info.title, "window is minimized, restoring");
        engine.restore(window)?;
        sleep(config.placement_delay).await;
    }
    engine.maximize(window)?;
    sleep(config.placement_delay).await;

    engine.bring_to_top(window)?;
    if wait_for_foreground(engine, config, window, config.activation_wait).await {
        debug!("window activated via BringWindowToTop");
        return Ok(ActivationOutcome::Activated(ActivationTier::BringToTop));
    }

    engine.post_activation(window)?;
    if wait_for_foreground(engine, config, window, config.activation_wait).await {
        debug!("window activated via posted activation messages");
        return Ok(ActivationOutcome::Activated(ActivationTier::PostMessages));
    }

    engine.force_foreground(window)?;
    if wait_for_foreground(engine, config, window, config.forced_activation_wait).await {
        debug!("window activated via forced foreground");
        return Ok(ActivationOutcome::Activated(
            ActivationTier::ForcedForeground,
        ));
    }

    warn!(
        title = %info.title,
        "failed to bring SAP window to the foreground, continuing anyway"
    );
    Ok(ActivationOutcome::WarnedNotActivated)
}
