use crate::utils::{
    ClickArgs, EmptyArgs, LaunchTransactionArgs, MoveMouseArgs, SapGuiWrapper, SaveScreenshotArgs,
    ScreenshotMode, ScrollArgs, TypeTextArgs,
};
use chrono::Local;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ResourceContents,
    ServerCapabilities, ServerInfo,
};
use rmcp::{tool, Error as McpError, ServerHandler};
use sapgui::{AutomationError, CapturedState, ScrollDirection};
use std::env;
use std::fmt::Display;
use tracing::{error, info};

/// Failures are rendered as error-text tool results, never as protocol
/// errors, so the client always gets something it can show the model.
fn tool_error(tool: &str, e: impl Display) -> CallToolResult {
    error!(tool, "{e}");
    CallToolResult::error(vec![Content::text(format!(
        "Error executing {tool}: {e}"
    ))])
}

fn parse_direction(raw: &str) -> Result<ScrollDirection, String> {
    match raw.to_lowercase().as_str() {
        "up" => Ok(ScrollDirection::Up),
        "down" => Ok(ScrollDirection::Down),
        other => Err(format!(
            "invalid scroll direction '{other}', expected 'up' or 'down'"
        )),
    }
}

/// Builds the response contents for an operation: scraped text sections
/// first, then the screenshot in the requested representation.
fn state_contents(
    state: &CapturedState,
    mode: ScreenshotMode,
) -> Result<Vec<Content>, AutomationError> {
    let mut contents = Vec::new();

    if !state.text.error_messages.is_empty() {
        contents.push(Content::text(format!(
            "Errors: {}",
            state.text.error_messages.join(", ")
        )));
    }
    if !state.text.status_messages.is_empty() {
        contents.push(Content::text(format!(
            "Status: {}",
            state.text.status_messages.join(", ")
        )));
    }
    if !state.text.field_values.is_empty() {
        let fields = state
            .text
            .field_values
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        contents.push(Content::text(format!("Fields:\n{fields}")));
    }

    match mode {
        ScreenshotMode::None => {}
        ScreenshotMode::AsFile => {
            let path = env::temp_dir().join("sap_screenshot.png");
            sapgui::capture::write_base64_png(&state.image, &path)?;
            contents.push(Content::text(format!(
                "Screenshot saved to {}",
                path.display()
            )));
        }
        ScreenshotMode::AsBase64 => {
            contents.push(Content::text(state.image.clone()));
        }
        ScreenshotMode::AsImageContent => {
            contents.push(Content::image(state.image.clone(), "image/png".to_string()));
            contents.push(Content::text(format!(
                "data:image/png;base64,{}",
                state.image
            )));
        }
        ScreenshotMode::AsImageUrl => {
            contents.push(Content::resource(ResourceContents::TextResourceContents {
                uri: "application:image".to_string(),
                mime_type: Some("image/png".to_string()),
                text: format!("data:image/png;base64,{}", state.image),
            }));
        }
    }

    Ok(contents)
}

/// Applies an operation closure to a session reference with a concrete
/// lifetime, so the closure's returned future may borrow the session.
fn with_session<'a, F, Fut>(session: &'a sapgui::SapSession, op: F) -> Fut
where
    F: FnOnce(&'a sapgui::SapSession) -> Fut,
{
    op(session)
}

/// Runs one screenshot-returning operation end to end: resolve the mode,
/// get the session, perform the action, package the result.
macro_rules! run_captured {
    ($self:ident, $tool:literal, $mode_arg:expr, $op:expr) => {{
        let mode = match ScreenshotMode::resolve($mode_arg) {
            Ok(mode) => mode,
            Err(e) => return Ok(tool_error($tool, e)),
        };
        let session = match $self.session().await {
            Ok(session) => session,
            Err(e) => return Ok(tool_error($tool, e)),
        };
        match with_session(session, $op).await {
            Ok(state) => match state_contents(&state, mode) {
                Ok(contents) => Ok(CallToolResult::success(contents)),
                Err(e) => Ok(tool_error($tool, e)),
            },
            Err(e) => Ok(tool_error($tool, e)),
        }
    }};
}

#[tool(tool_box)]
impl SapGuiWrapper {
    #[tool(
        description = "Launch a SAP transaction code and return a screenshot of the resulting screen. Kills any running SAP GUI first and logs in with credentials from the SAP_SYSTEM, SAP_CLIENT, SAP_USER and SAP_PASSWORD environment variables."
    )]
    async fn launch_transaction(
        &self,
        #[tool(aggr)] args: LaunchTransactionArgs,
    ) -> Result<CallToolResult, McpError> {
        info!(transaction = %args.transaction, "Launching transaction");
        run_captured!(
            self,
            "launch_transaction",
            args.return_screenshot.as_deref(),
            |session: &sapgui::SapSession| session.launch_transaction(&args.transaction)
        )
    }

    #[tool(
        description = "Click at specific coordinates inside the SAP GUI window and return a screenshot of the resulting screen."
    )]
    async fn sap_click(
        &self,
        #[tool(aggr)] args: ClickArgs,
    ) -> Result<CallToolResult, McpError> {
        run_captured!(
            self,
            "sap_click",
            args.return_screenshot.as_deref(),
            |session: &sapgui::SapSession| session.click_position(args.x, args.y)
        )
    }

    #[tool(
        description = "Move the mouse cursor to specific coordinates inside the SAP GUI window and return a screenshot of the screen."
    )]
    async fn sap_move_mouse(
        &self,
        #[tool(aggr)] args: MoveMouseArgs,
    ) -> Result<CallToolResult, McpError> {
        run_captured!(
            self,
            "sap_move_mouse",
            args.return_screenshot.as_deref(),
            |session: &sapgui::SapSession| session.move_mouse(args.x, args.y)
        )
    }

    #[tool(
        description = "Type text at the current cursor position in the SAP GUI window and return a screenshot of the resulting screen. Supports SendKeys-style markup like {TAB}, {ENTER} and ~."
    )]
    async fn sap_type(
        &self,
        #[tool(aggr)] args: TypeTextArgs,
    ) -> Result<CallToolResult, McpError> {
        run_captured!(
            self,
            "sap_type",
            args.return_screenshot.as_deref(),
            |session: &sapgui::SapSession| session.type_text(&args.text)
        )
    }

    #[tool(
        description = "Scroll the SAP GUI screen up or down and return a screenshot of the resulting view."
    )]
    async fn sap_scroll(
        &self,
        #[tool(aggr)] args: ScrollArgs,
    ) -> Result<CallToolResult, McpError> {
        let direction = match parse_direction(&args.direction) {
            Ok(direction) => direction,
            Err(e) => return Ok(tool_error("sap_scroll", e)),
        };
        run_captured!(
            self,
            "sap_scroll",
            args.return_screenshot.as_deref(),
            |session: &sapgui::SapSession| session.scroll_screen(direction)
        )
    }

    #[tool(
        description = "End the current SAP session by closing all SAP GUI processes."
    )]
    async fn end_transaction(
        &self,
        #[tool(aggr)] _args: EmptyArgs,
    ) -> Result<CallToolResult, McpError> {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => return Ok(tool_error("end_transaction", e)),
        };
        match session.end_session().await {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(
                "Status: success",
            )])),
            Err(e) => Ok(tool_error("end_transaction", e)),
        }
    }

    #[tool(description = "Save the last captured screenshot to a PNG file.")]
    async fn save_last_screenshot(
        &self,
        #[tool(aggr)] args: SaveScreenshotArgs,
    ) -> Result<CallToolResult, McpError> {
        if args.filename.trim().is_empty() {
            return Ok(tool_error("save_last_screenshot", "filename is required"));
        }
        let path = std::path::PathBuf::from(&args.filename);

        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => return Ok(tool_error("save_last_screenshot", e)),
        };
        match session.save_last_screenshot(&path).await {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Screenshot saved to {}",
                path.display()
            ))])),
            Err(e) => Ok(tool_error("save_last_screenshot", e)),
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for SapGuiWrapper {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(get_server_instructions()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapgui::WindowText;

    fn captured() -> CapturedState {
        CapturedState {
            image: "iVBORw0KGgoAAAANSUhEUg==".to_string(),
            text: WindowText::default(),
        }
    }

    #[test]
    fn as_base64_returns_the_raw_string() {
        let state = captured();
        let contents = state_contents(&state, ScreenshotMode::AsBase64).unwrap();
        let json = serde_json::to_value(&contents).unwrap();
        assert_eq!(json[0]["type"], "text");
        assert_eq!(json[0]["text"].as_str(), Some(state.image.as_str()));
    }

    #[test]
    fn as_imageurl_embeds_a_data_uri_resource() {
        let state = captured();
        let contents = state_contents(&state, ScreenshotMode::AsImageUrl).unwrap();
        let json = serde_json::to_value(&contents).unwrap();
        assert_eq!(
            json[0]["resource"]["text"].as_str(),
            Some(format!("data:image/png;base64,{}", state.image).as_str())
        );
    }

    #[test]
    fn none_mode_omits_the_image() {
        let contents = state_contents(&captured(), ScreenshotMode::None).unwrap();
        assert!(contents.is_empty());
    }

    #[test]
    fn text_sections_come_before_the_image() {
        let mut state = captured();
        state.text.error_messages.push("Order invalid".to_string());
        let contents = state_contents(&state, ScreenshotMode::AsBase64).unwrap();
        let json = serde_json::to_value(&contents).unwrap();
        assert_eq!(json[0]["text"].as_str(), Some("Errors: Order invalid"));
        assert_eq!(json[1]["text"].as_str(), Some(state.image.as_str()));
    }
}

fn get_server_instructions() -> String {
    let current_date_time = Local::now().to_string();
    let current_os = env::consts::OS;

    format!(
        r#"
You control the SAP GUI for Windows frontend through screenshots and raw mouse/keyboard input. There is no UI object tree: you see what a human sees and act where a human would click.

**Core Workflow: Launch, Look, Act**

1.  **Launch a Transaction:** Start with `launch_transaction` and a transaction code (e.g. VA01, ME21N, MM03). This restarts SAP GUI, logs in with the configured credentials, handles the multiple-logon popup automatically, and returns a screenshot of the initial screen.

2.  **Read the Screenshot and Text:** Every tool response carries a screenshot plus any error messages, status messages, and field values scraped from the window. Always inspect these before the next step; SAP reports problems in the status bar rather than failing the operation.

3.  **Interact by Coordinates:** Use `sap_click` and `sap_move_mouse` with pixel coordinates measured on the screenshot you just received. Coordinates are relative to the SAP window, not the screen, and display scaling is handled for you.

4.  **Type with Markup:** `sap_type` types at the current focus and understands SendKeys-style markup: `~` or `{{ENTER}}` for Enter, `{{TAB}}` to move between fields, `{{F1}}`-`{{F16}}`, arrow keys, `{{ESC}}`, `{{BACKSPACE}}`, `{{DELETE}}`. Click a field first, then type.

5.  **Scroll When Needed:** `sap_scroll` with direction "up" or "down" for long lists and tables.

6.  **Clean Up:** Call `end_transaction` when the task is finished so no SAP session is left behind.

**Screenshot Modes**

Tools that take a screenshot accept `return_screenshot`: `none`, `as_file` (written to the temp directory), `as_base64`, `as_imagecontent`, or `as_imageurl` (default). `save_last_screenshot` writes the most recent capture to a path of your choice.

**Important Notes**

*   Credentials come from the `SAP_SYSTEM`, `SAP_CLIENT`, `SAP_USER` and `SAP_PASSWORD` environment variables; launch fails fast if one is missing.
*   `launch_transaction` always starts a fresh SAP GUI, terminating any prior instance.
*   Wait for each tool result before issuing the next action; SAP screens render slowly after input.

Current Date and Time: {current_date_time}
Operating System: {current_os}
"#
    )
}
