use crate::core::Registry;
use crate::platform::Host;
use crate::shortcuts::HotkeyManager;
use fusuma_ipc::{Command, Response};

use super::command::process_command;
use super::effects::execute_effects;

/// Unified command dispatcher for IPC and hotkey commands.
/// Handles the common pattern: process command -> execute effects -> run posted work.
pub fn dispatch_command(
    cmd: &Command,
    registry: &mut Registry,
    hotkey_manager: &mut HotkeyManager,
    host: &Host,
) -> Response {
    let result = process_command(registry, hotkey_manager, host, cmd);

    if let Err(e) = execute_effects(result.effects, registry, host) {
        return Response::Error { message: e };
    }
    registry.run_posted_actions(host);

    result.response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::platform::mock::*;
    use crate::platform::WindowSystem;
    use std::sync::mpsc as std_mpsc;

    fn setup_test_context() -> (TestEnv, Registry, HotkeyManager) {
        let env = TestEnv::new(
            MockWindowSystem::new()
                .with_monitors(vec![create_test_monitor(0, 0, 0, 1920, 1080)])
                .with_windows(vec![
                    create_test_window(100, "Browser", "Docs", "firefox"),
                    create_test_window(101, "Terminal", "shell", "wezterm"),
                ])
                .with_foreground(Some(100)),
        );
        let config = Config::from_json(r#"{ "workspaces": [ {}, {} ], "rules": [ {} ] }"#).unwrap();
        let mut registry = Registry::new(&config, env.system.monitors()).unwrap();
        registry.start(&env.host());
        let (tx, _rx) = std_mpsc::channel();
        (env, registry, HotkeyManager::new(tx))
    }

    #[test]
    fn test_dispatch_command_list_windows() {
        let (env, mut registry, mut hotkeys) = setup_test_context();
        let response = dispatch_command(
            &Command::ListWindows { workspace: None },
            &mut registry,
            &mut hotkeys,
            &env.host(),
        );
        match response {
            Response::Windows { windows } => {
                assert_eq!(windows.len(), 2);
                assert!(windows.iter().any(|w| w.id == 100 && w.is_focused));
            }
            other => panic!("Unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_command_exec() {
        let (env, mut registry, mut hotkeys) = setup_test_context();
        env.manipulator.take_calls();
        let response = dispatch_command(
            &Command::Exec {
                command: "calc.exe".to_string(),
            },
            &mut registry,
            &mut hotkeys,
            &env.host(),
        );
        assert!(matches!(response, Response::Ok));
        assert_eq!(
            env.manipulator.calls(),
            vec![ManipulatorCall::ExecCommand("calc.exe".to_string())]
        );
    }

    #[test]
    fn test_dispatch_command_exec_or_focus_existing() {
        let (env, mut registry, mut hotkeys) = setup_test_context();
        let response = dispatch_command(
            &Command::ExecOrFocus {
                process_name: "wezterm".to_string(),
                command: "wezterm.exe".to_string(),
            },
            &mut registry,
            &mut hotkeys,
            &env.host(),
        );
        assert!(matches!(response, Response::Ok));
        assert!(env.manipulator.foreground_calls().contains(&101));
    }
}
