use std::collections::HashMap;

use super::*;
use crate::errors::AutomationError;
use crate::locator::{find_any_sap_window, find_main_window};
use crate::platforms::Key;

const SAP_PID: u32 = 42;

#[tokio::test]
async fn finds_main_window_and_skips_launcher() {
    let state = MockState {
        windows: vec![
            window(1, "SAP Logon 770", SAP_PID, default_rect()),
            window(2, "SAP Easy Access", SAP_PID, default_rect()),
        ],
        ..MockState::default()
    };
    let engine = MockEngine::new(state, GrantTier::BringToTop);

    let located = find_main_window(&engine, &fast_config(), SAP_PID, 1.0)
        .await
        .unwrap();
    assert_eq!(located.main.0, 2);
    assert!(located.popup.is_none());
}

#[tokio::test]
async fn ignores_invisible_windows_and_other_processes() {
    let mut hidden = window(1, "SAP Easy Access", SAP_PID, default_rect());
    hidden.visible = false;
    let state = MockState {
        windows: vec![
            hidden,
            window(2, "SAP Easy Access", 999, default_rect()),
            window(3, "", SAP_PID, default_rect()),
        ],
        ..MockState::default()
    };
    let engine = MockEngine::new(state, GrantTier::BringToTop);

    let err = find_main_window(&engine, &fast_config(), SAP_PID, 1.0)
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::WindowNotFound(_)));
}

#[tokio::test]
async fn search_times_out_when_nothing_appears() {
    let engine = MockEngine::new(MockState::default(), GrantTier::BringToTop);
    let err = find_main_window(&engine, &fast_config(), SAP_PID, 1.0)
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::WindowNotFound(_)));
}

#[tokio::test]
async fn popup_is_dismissed_then_main_window_found() {
    let popup = window(
        7,
        "License Information for Multiple Logons",
        SAP_PID,
        Rect {
            x: 200,
            y: 100,
            width: 400,
            height: 300,
        },
    );
    let state = MockState {
        windows: vec![popup],
        remove_after_enter: vec![WindowId(7)],
        appear_after_enter: vec![window(8, "SAP Easy Access", SAP_PID, default_rect())],
        ..MockState::default()
    };
    // The popup only responds to the forced foreground, like the real one.
    let engine = MockEngine::new(state, GrantTier::ForceForeground);

    let located = find_main_window(&engine, &fast_config(), SAP_PID, 1.0)
        .await
        .unwrap();
    assert_eq!(located.main.0, 8);
    assert_eq!(located.popup, Some(WindowId(7)));

    // Dismissal sequence: activate, click the logon option, confirm.
    let actions = engine.actions();
    let force = actions
        .iter()
        .position(|a| *a == Action::ForceForeground(7))
        .unwrap();
    let mv = actions
        .iter()
        .position(|a| matches!(a, Action::MoveCursor(_, _)))
        .unwrap();
    let click = actions.iter().position(|a| *a == Action::Click).unwrap();
    let enter = actions
        .iter()
        .position(|a| *a == Action::Key(Key::Enter))
        .unwrap();
    assert!(force < mv && mv < click && click < enter);

    // The popup is handled once: a single click and a single confirm.
    let clicks = actions.iter().filter(|a| **a == Action::Click).count();
    let enters = actions
        .iter()
        .filter(|a| **a == Action::Key(Key::Enter))
        .count();
    assert_eq!(clicks, 1);
    assert_eq!(enters, 1);

    // Click lands at the option position: center x, 38% down, unscaled,
    // offset by the popup origin.
    assert!(actions.contains(&Action::MoveCursor(200 + 200, 100 + 114)));
}

#[tokio::test]
async fn find_any_returns_none_without_sap_process() {
    let state = MockState {
        windows: vec![window(1, "SAP Easy Access", SAP_PID, default_rect())],
        ..MockState::default()
    };
    let engine = MockEngine::new(state, GrantTier::BringToTop);

    let found = find_any_sap_window(&engine, &fast_config()).unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn find_any_prefers_the_foreground_window() {
    let mut pids = HashMap::new();
    pids.insert("saplogon.exe".to_string(), vec![SAP_PID]);
    let state = MockState {
        windows: vec![
            window(1, "SAP Logon 770", SAP_PID, default_rect()),
            window(2, "SAP Easy Access", SAP_PID, default_rect()),
            window(3, "Create Sales Order", SAP_PID, default_rect()),
        ],
        foreground: Some(WindowId(3)),
        pids,
        ..MockState::default()
    };
    let engine = MockEngine::new(state, GrantTier::BringToTop);

    let found = find_any_sap_window(&engine, &fast_config()).unwrap();
    assert_eq!(found, Some(WindowId(3)));
}

#[tokio::test]
async fn find_any_falls_back_to_first_candidate() {
    let mut pids = HashMap::new();
    pids.insert("saplogon.exe".to_string(), vec![SAP_PID]);
    let state = MockState {
        windows: vec![
            window(1, "SAP Logon 770", SAP_PID, default_rect()),
            window(2, "SAP Easy Access", SAP_PID, default_rect()),
            window(3, "Create Sales Order", SAP_PID, default_rect()),
        ],
        pids,
        ..MockState::default()
    };
    let engine = MockEngine::new(state, GrantTier::BringToTop);

    let found = find_any_sap_window(&engine, &fast_config()).unwrap();
    assert_eq!(found, Some(WindowId(2)));
}
