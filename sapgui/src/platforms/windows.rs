use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};
use windows::core::w;
use windows::Win32::Foundation::{BOOL, ERROR_SUCCESS, HWND, LPARAM, RECT, TRUE, WPARAM};
use windows::Win32::System::Registry::{RegGetValueW, HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ};
use windows::Win32::UI::HiDpi::{GetDpiForSystem, SetProcessDPIAware};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_WHEEL, MOUSEINPUT, VIRTUAL_KEY, VK_BACK, VK_DELETE, VK_DOWN, VK_ESCAPE, VK_F1,
    VK_LEFT, VK_MENU, VK_RETURN, VK_RIGHT, VK_TAB, VK_UP,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumChildWindows, EnumWindows, GetForegroundWindow, GetWindowRect,
    GetWindowTextW, GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, IsZoomed,
    PostMessageW, SetCursorPos, SetForegroundWindow, ShowWindow, SC_RESTORE, SW_MAXIMIZE,
    SW_RESTORE, WA_ACTIVE, WM_ACTIVATE, WM_SYSCOMMAND,
};

use crate::errors::AutomationError;
use crate::platforms::{DesktopEngine, Key, Placement, WindowId, WindowInfo};
use crate::{Rect, ScreenshotResult};

const INPUT_SIZE: i32 = size_of::<INPUT>() as i32;
const WHEEL_DELTA: i32 = 120;

/// Win32-backed engine. Window handles are raw HWND values; everything here
/// is stateless, so the struct is freely shareable across tasks.
pub struct WindowsEngine;

impl WindowsEngine {
    pub fn new() -> Result<Self, AutomationError> {
        // Opt into DPI awareness before any coordinate work, otherwise the
        // system lies about window rectangles on scaled displays.
        unsafe {
            if !SetProcessDPIAware().as_bool() {
                warn!("SetProcessDPIAware failed, coordinates may be virtualized");
            }
        }
        Ok(Self)
    }
}

fn hwnd_of(id: WindowId) -> HWND {
    HWND(id.0 as *mut core::ffi::c_void)
}

unsafe extern "system" fn collect_hwnds(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let out = &mut *(lparam.0 as *mut Vec<u64>);
    out.push(hwnd.0 as u64);
    TRUE
}

fn keybd_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn mouse_input(data: i32, flags: windows::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: data,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn virtual_key(key: Key) -> VIRTUAL_KEY {
    match key {
        Key::Tab => VK_TAB,
        Key::Enter => VK_RETURN,
        Key::Escape => VK_ESCAPE,
        Key::Backspace => VK_BACK,
        Key::Delete => VK_DELETE,
        Key::Up => VK_UP,
        Key::Down => VK_DOWN,
        Key::Left => VK_LEFT,
        Key::Right => VK_RIGHT,
        Key::Function(n) => VIRTUAL_KEY(VK_F1.0 + u16::from(n.saturating_sub(1))),
    }
}

fn send_inputs(inputs: &[INPUT], what: &str) -> Result<(), AutomationError> {
    let sent = unsafe { SendInput(inputs, INPUT_SIZE) };
    if sent as usize != inputs.len() {
        return Err(AutomationError::PlatformError(format!(
            "SendInput injected {sent} of {} events for {what}",
            inputs.len()
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl DesktopEngine for WindowsEngine {
    fn list_top_level_windows(&self) -> Result<Vec<WindowInfo>, AutomationError> {
        let mut handles: Vec<u64> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_hwnds),
                LPARAM(&mut handles as *mut Vec<u64> as isize),
            )
            .map_err(|e| AutomationError::PlatformError(format!("EnumWindows failed: {e}")))?;
        }
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            // Windows can vanish between enumeration and inspection.
            if let Ok(info) = self.window_info(WindowId(handle)) {
                out.push(info);
            }
        }
        Ok(out)
    }

    fn list_child_windows(&self, parent: WindowId) -> Result<Vec<WindowInfo>, AutomationError> {
        let mut handles: Vec<u64> = Vec::new();
        unsafe {
            let _ = EnumChildWindows(
                Some(hwnd_of(parent)),
                Some(collect_hwnds),
                LPARAM(&mut handles as *mut Vec<u64> as isize),
            );
        }
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = self.window_info(WindowId(handle)) {
                out.push(info);
            }
        }
        Ok(out)
    }

    fn is_window(&self, id: WindowId) -> bool {
        unsafe { IsWindow(Some(hwnd_of(id))).as_bool() }
    }

    fn window_info(&self, id: WindowId) -> Result<WindowInfo, AutomationError> {
        let hwnd = hwnd_of(id);
        unsafe {
            if !IsWindow(Some(hwnd)).as_bool() {
                return Err(AutomationError::WindowNotFound(format!(
                    "handle {:#x} is no longer valid",
                    id.0
                )));
            }
            let mut buf = [0u16; 512];
            let len = GetWindowTextW(hwnd, &mut buf);
            let title = String::from_utf16_lossy(&buf[..len.max(0) as usize]);

            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut pid));

            let mut rc = RECT::default();
            GetWindowRect(hwnd, &mut rc).map_err(|e| {
                AutomationError::PlatformError(format!("GetWindowRect failed: {e}"))
            })?;

            let placement = if IsIconic(hwnd).as_bool() {
                Placement::Minimized
            } else if IsZoomed(hwnd).as_bool() {
                Placement::Maximized
            } else {
                Placement::Normal
            };

            Ok(WindowInfo {
                id,
                title,
                pid,
                rect: Rect {
                    x: rc.left,
                    y: rc.top,
                    width: rc.right - rc.left,
                    height: rc.bottom - rc.top,
                },
                placement,
                visible: IsWindowVisible(hwnd).as_bool(),
            })
        }
    }

    fn foreground_window(&self) -> Option<WindowId> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            None
        } else {
            Some(WindowId(hwnd.0 as u64))
        }
    }

    fn restore(&self, id: WindowId) -> Result<(), AutomationError> {
        unsafe {
            let _ = ShowWindow(hwnd_of(id), SW_RESTORE);
        }
        Ok(())
    }

    fn maximize(&self, id: WindowId) -> Result<(), AutomationError> {
        unsafe {
            let _ = ShowWindow(hwnd_of(id), SW_MAXIMIZE);
        }
        Ok(())
    }

    fn bring_to_top(&self, id: WindowId) -> Result<(), AutomationError> {
        unsafe {
            BringWindowToTop(hwnd_of(id)).map_err(|e| {
                AutomationError::PlatformError(format!("BringWindowToTop failed: {e}"))
            })
        }
    }

    fn post_activation(&self, id: WindowId) -> Result<(), AutomationError> {
        let hwnd = hwnd_of(id);
        unsafe {
            PostMessageW(
                Some(hwnd),
                WM_SYSCOMMAND,
                WPARAM(SC_RESTORE as usize),
                LPARAM(0),
            )
            .map_err(|e| AutomationError::PlatformError(format!("PostMessageW failed: {e}")))?;
            PostMessageW(Some(hwnd), WM_ACTIVATE, WPARAM(WA_ACTIVE as usize), LPARAM(0))
                .map_err(|e| AutomationError::PlatformError(format!("PostMessageW failed: {e}")))?;
        }
        Ok(())
    }

    fn force_foreground(&self, id: WindowId) -> Result<(), AutomationError> {
        // Tapping Alt marks this thread as the last input source, which
        // unlocks SetForegroundWindow's focus-stealing restrictions.
        send_inputs(
            &[keybd_input(VK_MENU, 0, KEYBD_EVENT_FLAGS(0))],
            "alt down",
        )?;
        let accepted = unsafe { SetForegroundWindow(hwnd_of(id)).as_bool() };
        send_inputs(&[keybd_input(VK_MENU, 0, KEYEVENTF_KEYUP)], "alt up")?;
        if !accepted {
            debug!(handle = id.0, "SetForegroundWindow was refused");
        }
        Ok(())
    }

    fn move_cursor(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        unsafe {
            SetCursorPos(x, y)
                .map_err(|e| AutomationError::PlatformError(format!("SetCursorPos failed: {e}")))
        }
    }

    fn click_primary(&self) -> Result<(), AutomationError> {
        send_inputs(
            &[
                mouse_input(0, MOUSEEVENTF_LEFTDOWN),
                mouse_input(0, MOUSEEVENTF_LEFTUP),
            ],
            "left click",
        )
    }

    fn scroll_wheel(&self, delta: i32) -> Result<(), AutomationError> {
        send_inputs(
            &[mouse_input(delta * WHEEL_DELTA, MOUSEEVENTF_WHEEL)],
            "wheel scroll",
        )
    }

    fn send_text(&self, text: &str) -> Result<(), AutomationError> {
        let mut inputs = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            inputs.push(keybd_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE));
            inputs.push(keybd_input(
                VIRTUAL_KEY(0),
                unit,
                KEYEVENTF_UNICODE | KEYEVENTF_KEYUP,
            ));
        }
        if inputs.is_empty() {
            return Ok(());
        }
        send_inputs(&inputs, "unicode text")
    }

    fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        let vk = virtual_key(key);
        send_inputs(
            &[
                keybd_input(vk, 0, KEYBD_EVENT_FLAGS(0)),
                keybd_input(vk, 0, KEYEVENTF_KEYUP),
            ],
            "key press",
        )
    }

    async fn capture_region(&self, rect: Rect) -> Result<ScreenshotResult, AutomationError> {
        let cx = rect.x + rect.width / 2;
        let cy = rect.y + rect.height / 2;
        let monitor = xcap::Monitor::from_point(cx, cy).map_err(|e| {
            AutomationError::CaptureFailure(format!("no monitor at ({cx}, {cy}): {e}"))
        })?;
        let monitor_x = monitor
            .x()
            .map_err(|e| AutomationError::CaptureFailure(format!("monitor x: {e}")))?;
        let monitor_y = monitor
            .y()
            .map_err(|e| AutomationError::CaptureFailure(format!("monitor y: {e}")))?;
        let image = monitor
            .capture_image()
            .map_err(|e| AutomationError::CaptureFailure(format!("capture failed: {e}")))?;

        // Clamp the window rectangle to what the monitor actually delivered;
        // windows routinely hang a few pixels off-screen.
        let rel_x = (rect.x - monitor_x).max(0) as u32;
        let rel_y = (rect.y - monitor_y).max(0) as u32;
        if rel_x >= image.width() || rel_y >= image.height() {
            return Err(AutomationError::CaptureFailure(format!(
                "window at ({}, {}) lies outside the captured monitor",
                rect.x, rect.y
            )));
        }
        let width = (rect.width.max(0) as u32).min(image.width() - rel_x);
        let height = (rect.height.max(0) as u32).min(image.height() - rel_y);
        let cropped = image::imageops::crop_imm(&image, rel_x, rel_y, width, height).to_image();

        Ok(ScreenshotResult {
            image_data: cropped.to_vec(),
            width: cropped.width(),
            height: cropped.height(),
        })
    }

    fn system_dpi(&self) -> Option<u32> {
        let dpi = unsafe { GetDpiForSystem() };
        if dpi == 0 {
            None
        } else {
            Some(dpi)
        }
    }

    fn pids_by_name(&self, name: &str) -> Vec<u32> {
        let mut sys = sysinfo::System::new();
        sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        sys.processes()
            .iter()
            .filter(|(_, process)| {
                process
                    .name()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(name)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }

    fn kill_by_name(&self, name: &str) -> usize {
        let mut sys = sysinfo::System::new();
        sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        let mut killed = 0;
        for (_, process) in sys.processes() {
            if process
                .name()
                .to_string_lossy()
                .eq_ignore_ascii_case(name)
                && process.kill()
            {
                killed += 1;
            }
        }
        killed
    }

    fn spawn(&self, path: &Path, args: &[String]) -> Result<u32, AutomationError> {
        let child = Command::new(path).args(args).spawn().map_err(|e| {
            AutomationError::LaunchFailure(format!("failed to start {}: {e}", path.display()))
        })?;
        Ok(child.id())
    }

    fn install_path_from_registry(&self) -> Option<PathBuf> {
        let mut buf = [0u16; 512];
        let mut size = (buf.len() * 2) as u32;
        let status = unsafe {
            RegGetValueW(
                HKEY_LOCAL_MACHINE,
                w!("SOFTWARE\\WOW6432Node\\SAP\\SAPGUIFrontend"),
                w!("InstallationPath"),
                RRF_RT_REG_SZ,
                None,
                Some(buf.as_mut_ptr() as *mut core::ffi::c_void),
                Some(&mut size),
            )
        };
        if status != ERROR_SUCCESS {
            debug!(?status, "SAP GUI registry key not readable");
            return None;
        }
        // size is in bytes and includes the terminating NUL
        let len = (size as usize / 2).saturating_sub(1);
        let path = String::from_utf16_lossy(&buf[..len.min(buf.len())]);
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }
}
