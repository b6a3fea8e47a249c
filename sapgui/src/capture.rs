use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::errors::AutomationError;
use crate::platforms::{DesktopEngine, WindowId};
use crate::ScreenshotResult;

/// Generic container chrome that carries no transaction information.
/// Child windows with these exact titles are skipped during text scrape.
const UI_CHROME: [&str; 4] = [
    "AppToolbar",
    "Custom Container",
    "Control Container",
    "SAP's Advanced Treelist",
];

const ERROR_KEYWORDS: [&str; 4] = ["error", "does not exist", "invalid", "failed"];
const STATUS_KEYWORDS: [&str; 3] = ["success", "completed", "processed"];

/// Text scraped from the SAP window and its children, bucketed by what it
/// looks like. Produced on every state-changing operation so callers can
/// react to SAP messages without OCR.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WindowText {
    pub main_text: String,
    pub error_messages: Vec<String>,
    pub status_messages: Vec<String>,
    #[serde(serialize_with = "serialize_pairs_as_map")]
    pub field_values: Vec<(String, String)>,
}

fn serialize_pairs_as_map<S: Serializer>(
    pairs: &[(String, String)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(pairs.iter().map(|(k, v)| (k, v)))
}

/// How one piece of child-window text was classified. Error keywords win
/// over status keywords; the colon split only applies to text that matched
/// neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextClass {
    Error,
    Status,
    Field(String, String),
    Other,
}

pub fn classify(text: &str) -> TextClass {
    let lower = text.to_lowercase();
    if ERROR_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return TextClass::Error;
    }
    if STATUS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return TextClass::Status;
    }
    if let Some((label, value)) = text.split_once(':') {
        return TextClass::Field(label.trim().to_string(), value.trim().to_string());
    }
    TextClass::Other
}

/// Scrapes the window title and all child-window texts, classifying each.
/// Duplicate field labels keep the last value seen, preserving the position
/// of the first occurrence.
pub fn extract_text(
    engine: &dyn DesktopEngine,
    window: WindowId,
) -> Result<WindowText, AutomationError> {
    let mut out = WindowText {
        main_text: engine.window_info(window)?.title,
        ..WindowText::default()
    };

    for child in engine.list_child_windows(window)? {
        let text = child.title;
        if text.is_empty() || UI_CHROME.contains(&text.as_str()) {
            continue;
        }
        match classify(&text) {
            TextClass::Error => out.error_messages.push(text),
            TextClass::Status => out.status_messages.push(text),
            TextClass::Field(label, value) => {
                if let Some(slot) = out.field_values.iter_mut().find(|(k, _)| *k == label) {
                    slot.1 = value;
                } else {
                    out.field_values.push((label, value));
                }
            }
            TextClass::Other => {}
        }
    }

    debug!(
        errors = out.error_messages.len(),
        statuses = out.status_messages.len(),
        fields = out.field_values.len(),
        "window text scraped"
    );
    Ok(out)
}

/// Encodes a raw RGBA capture as a base64 PNG string.
pub fn png_base64(shot: &ScreenshotResult) -> Result<String, AutomationError> {
    let mut png_data = Vec::new();
    PngEncoder::new(std::io::Cursor::new(&mut png_data))
        .write_image(
            &shot.image_data,
            shot.width,
            shot.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| AutomationError::CaptureFailure(format!("PNG encoding failed: {e}")))?;
    Ok(BASE64.encode(&png_data))
}

/// Writes a previously encoded base64 PNG back out as a file.
pub fn write_base64_png(encoded: &str, path: &Path) -> Result<(), AutomationError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| AutomationError::CaptureFailure(format!("invalid PNG data: {e}")))?;
    std::fs::write(path, bytes).map_err(|e| {
        AutomationError::CaptureFailure(format!("failed to write {}: {e}", path.display()))
    })
}
