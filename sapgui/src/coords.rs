use crate::errors::AutomationError;
use crate::Rect;

/// Baseline Windows DPI; a system DPI of 96 means no scaling.
const BASE_DPI: f64 = 96.0;

/// Converts a raw system DPI into a scale factor, defaulting to 1.0 when
/// the platform cannot report one.
pub fn dpi_scale(system_dpi: Option<u32>) -> f64 {
    match system_dpi {
        Some(dpi) if dpi > 0 => f64::from(dpi) / BASE_DPI,
        _ => 1.0,
    }
}

/// Maps window-relative logical coordinates to absolute screen pixels.
///
/// Bounds are validated against the logical window size before scaling, so
/// the caller's mental model ("pixel 100,200 inside the window I see") holds
/// regardless of display scaling. `check_bounds` is off for the popup click,
/// which aims at a fraction of a window whose reported rect can disagree
/// with its rendered size mid-animation.
pub fn to_screen(
    rect: Rect,
    x: i32,
    y: i32,
    scale: f64,
    check_bounds: bool,
) -> Result<(i32, i32), AutomationError> {
    if check_bounds && (x < 0 || y < 0 || x > rect.width || y > rect.height) {
        return Err(AutomationError::BoundsError {
            x,
            y,
            width: rect.width,
            height: rect.height,
        });
    }
    let screen_x = rect.x + (f64::from(x) * scale).round() as i32;
    let screen_y = rect.y + (f64::from(y) * scale).round() as i32;
    Ok((screen_x, screen_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rect {
        Rect {
            x: 100,
            y: 50,
            width: 800,
            height: 600,
        }
    }

    #[test]
    fn unscaled_maps_by_translation() {
        assert_eq!(to_screen(rect(), 10, 20, 1.0, true).unwrap(), (110, 70));
    }

    #[test]
    fn scale_applies_to_offset_not_origin() {
        // 150% scaling: the window origin is already in screen pixels.
        assert_eq!(to_screen(rect(), 100, 100, 1.5, true).unwrap(), (250, 200));
    }

    #[test]
    fn rounds_half_up() {
        // 33 * 1.25 = 41.25 -> 41; 34 * 1.25 = 42.5 -> 43
        assert_eq!(to_screen(rect(), 33, 34, 1.25, true).unwrap(), (141, 93));
    }

    #[test]
    fn boundary_coordinates_are_inside() {
        assert!(to_screen(rect(), 0, 0, 1.0, true).is_ok());
        assert!(to_screen(rect(), 800, 600, 1.0, true).is_ok());
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let err = to_screen(rect(), 801, 10, 1.0, true).unwrap_err();
        assert!(matches!(
            err,
            AutomationError::BoundsError {
                x: 801,
                width: 800,
                ..
            }
        ));
        assert!(to_screen(rect(), -1, 0, 1.0, true).is_err());
        assert!(to_screen(rect(), 0, 601, 1.0, true).is_err());
    }

    #[test]
    fn bounds_check_can_be_disabled() {
        assert_eq!(
            to_screen(rect(), -50, 9999, 1.0, false).unwrap(),
            (50, 10049)
        );
    }

    #[test]
    fn mapping_inverts_within_a_pixel() {
        let scale = 1.25;
        for (x, y) in [(0, 0), (33, 34), (640, 480), (800, 600)] {
            let (sx, sy) = to_screen(rect(), x, y, scale, true).unwrap();
            let back_x = (f64::from(sx - rect().x) / scale).round() as i32;
            let back_y = (f64::from(sy - rect().y) / scale).round() as i32;
            assert!((back_x - x).abs() <= 1, "x: {x} -> {sx} -> {back_x}");
            assert!((back_y - y).abs() <= 1, "y: {y} -> {sy} -> {back_y}");
        }
    }

    #[test]
    fn dpi_scale_defaults_to_one() {
        assert_eq!(dpi_scale(None), 1.0);
        assert_eq!(dpi_scale(Some(0)), 1.0);
        assert_eq!(dpi_scale(Some(96)), 1.0);
        assert_eq!(dpi_scale(Some(144)), 1.5);
    }
}
