use crate::core::{Registry, WindowHandle, WorkspaceId};
use crate::effect::{CommandResult, Effect};
use crate::layout;
use crate::platform::Host;
use crate::shortcuts::HotkeyManager;
use fusuma_ipc::{BindingInfo, Command, Response};

/// Resolves a window argument, defaulting to the foreground window.
fn target_window(host: &Host, window: Option<u64>) -> Result<WindowHandle, String> {
    window
        .or_else(|| host.system.foreground_window())
        .ok_or_else(|| "No window given and no foreground window".to_string())
}

fn managed_window(
    registry: &Registry,
    host: &Host,
    window: Option<u64>,
) -> Result<WindowHandle, String> {
    let handle = target_window(host, window)?;
    let handle = registry.resolve_owner(handle);
    if !registry.is_known(handle) {
        return Err(format!("Window {} is not managed", handle));
    }
    Ok(handle)
}

fn existing_workspace(registry: &Registry, id: WorkspaceId) -> Result<WorkspaceId, String> {
    registry
        .workspace(id)
        .map(|ws| ws.id)
        .ok_or_else(|| format!("Workspace {} does not exist", id))
}

/// The instance a command acts on: the current workspace's if it has one.
fn source_workspace(registry: &Registry, handle: WindowHandle) -> Option<WorkspaceId> {
    let ids = registry.workspaces_of(handle);
    let current = registry.current_workspace_id();
    if ids.contains(&current) {
        Some(current)
    } else {
        ids.first().copied()
    }
}

/// Applies a command to the registry and returns the response together with
/// the effects left for the caller.
pub fn process_command(
    registry: &mut Registry,
    hotkey_manager: &mut HotkeyManager,
    host: &Host,
    cmd: &Command,
) -> CommandResult {
    match run(registry, hotkey_manager, host, cmd) {
        Ok(result) => result,
        Err(e) => CommandResult::error(e),
    }
}

fn run(
    registry: &mut Registry,
    hotkey_manager: &mut HotkeyManager,
    host: &Host,
    cmd: &Command,
) -> Result<CommandResult, String> {
    let result = match cmd {
        // Workspace operations
        Command::SwitchToWorkspace { workspace } => {
            let id = existing_workspace(registry, *workspace)?;
            registry.switch_to_workspace(host, id, true);
            CommandResult::ok()
        }
        Command::SwitchToPreviousWorkspace => {
            registry.switch_to_previous_workspace(host);
            CommandResult::ok()
        }
        Command::MoveWindow { window, to, follow } => {
            let handle = managed_window(registry, host, *window)?;
            let to = existing_workspace(registry, *to)?;
            let from = source_workspace(registry, handle)
                .ok_or_else(|| format!("Window {} is not managed", handle))?;
            CommandResult::from_change(
                registry.move_window(host, handle, from, to, *follow),
                || format!("Window {} cannot move from workspace {} to {}", handle, from, to),
            )
        }
        Command::MoveWindowToPreviousWorkspace { window } => {
            let handle = managed_window(registry, host, *window)?;
            CommandResult::from_change(registry.move_to_previous_workspace(host, handle), || {
                format!("Window {} cannot move to the previous workspace", handle)
            })
        }
        Command::AddWindow { window, to } => {
            let handle = managed_window(registry, host, *window)?;
            let to = existing_workspace(registry, *to)?;
            let from = source_workspace(registry, handle)
                .ok_or_else(|| format!("Window {} is not managed", handle))?;
            CommandResult::from_change(
                registry.add_window_to_workspace(host, handle, to, from),
                || format!("Window {} is already on workspace {}", handle, to),
            )
        }
        Command::RemoveWindow { window, workspace } => {
            let handle = managed_window(registry, host, *window)?;
            let workspace = workspace.unwrap_or_else(|| registry.current_workspace_id());
            CommandResult::from_change(
                registry.remove_window_from_workspace(host, handle, workspace),
                || {
                    format!(
                        "Window {} cannot be removed from workspace {}",
                        handle, workspace
                    )
                },
            )
        }

        // Window operations
        Command::SwitchToWindow { window } => {
            let handle = managed_window(registry, host, Some(*window))?;
            CommandResult::from_change(registry.switch_to_application(host, handle), || {
                format!("Cannot switch to window {}", handle)
            })
        }
        Command::ToggleFloating { window } => {
            let handle = managed_window(registry, host, *window)?;
            CommandResult::from_change(registry.toggle_window_floating(host, handle), || {
                format!("Window {} is not on the current workspace", handle)
            })
        }
        Command::ToggleTitlebar { window } => {
            let handle = managed_window(registry, host, *window)?;
            CommandResult::from_change(registry.toggle_titlebar(host, handle), || {
                format!("Window {} is not on the current workspace", handle)
            })
        }
        Command::ToggleBorder { window } => {
            let handle = managed_window(registry, host, *window)?;
            CommandResult::from_change(registry.toggle_border(host, handle), || {
                format!("Window {} is not on the current workspace", handle)
            })
        }
        Command::ToggleTaskbar { window } => {
            let handle = managed_window(registry, host, *window)?;
            CommandResult::from_change(registry.toggle_taskbar_visibility(host, handle), || {
                format!("Window {} is not on the current workspace", handle)
            })
        }
        Command::ShiftWindow { window, direction } => {
            let handle = managed_window(registry, host, *window)?;
            registry.shift_window(host, handle, *direction);
            CommandResult::ok()
        }

        // Layout operations
        Command::ChangeLayout { workspace, layout } => {
            let id = workspace.unwrap_or_else(|| registry.current_workspace_id());
            if registry.change_layout(host, id, layout::from_kind(*layout))? {
                tracing::info!("Workspace {} layout changed to {:?}", id, layout);
            }
            CommandResult::ok()
        }
        Command::LayoutCommand {
            workspace,
            cmd,
            args,
        } => {
            let id = workspace.unwrap_or_else(|| registry.current_workspace_id());
            registry.layout_command(host, id, cmd, args)?;
            CommandResult::ok()
        }
        Command::Refresh => {
            registry.refresh(host);
            CommandResult::ok()
        }

        // Hotkey operations
        Command::Bind { key, action } => {
            hotkey_manager.bind(key, *action.clone())?;
            CommandResult::ok()
        }
        Command::Unbind { key } => {
            hotkey_manager.unbind(key)?;
            CommandResult::ok()
        }
        Command::ListBindings => {
            let bindings: Vec<BindingInfo> = hotkey_manager
                .list_bindings()
                .into_iter()
                .map(|(key, cmd)| BindingInfo {
                    key,
                    action: format!("{:?}", cmd),
                })
                .collect();
            CommandResult::with_response(Response::Bindings { bindings })
        }

        // Queries
        Command::ListWorkspaces => CommandResult::with_response(Response::Workspaces {
            workspaces: registry.workspace_infos(),
        }),
        Command::ListWindows { workspace } => {
            if let Some(id) = workspace {
                existing_workspace(registry, *id)?;
            }
            CommandResult::with_response(Response::Windows {
                windows: registry.window_infos(*workspace, host.system.foreground_window()),
            })
        }
        Command::GetState => CommandResult::with_response(Response::State {
            state: registry.state_info(host.system.foreground_window()),
        }),
        Command::FocusedWindow => CommandResult::with_response(Response::WindowId {
            id: host
                .system
                .foreground_window()
                .map(|h| registry.resolve_owner(h)),
        }),

        // Exec
        Command::Exec { command } => CommandResult::ok_with_effects(vec![Effect::ExecCommand {
            command: command.clone(),
        }]),
        Command::ExecOrFocus {
            process_name,
            command,
        } => {
            let existing = registry
                .workspaces
                .iter()
                .flat_map(|ws| ws.windows())
                .find(|w| w.process_name.eq_ignore_ascii_case(process_name))
                .map(|w| w.handle);
            match existing {
                Some(handle) => {
                    tracing::info!("Focusing existing {} window {}", process_name, handle);
                    CommandResult::ok_with_effects(vec![Effect::FocusWindow { handle }])
                }
                None => CommandResult::ok_with_effects(vec![Effect::ExecCommand {
                    command: command.clone(),
                }]),
            }
        }

        // Control
        Command::Quit => {
            tracing::info!("Quit command received");
            CommandResult::ok()
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::platform::mock::*;
    use crate::platform::{NativeWindow, WindowSystem};
    use fusuma_ipc::{LayoutKind, ShiftDirection};
    use std::sync::mpsc as std_mpsc;

    const CONFIG: &str = r#"{
        "workspaces": [
            { "name": "main" },
            { "name": "web", "layout": { "kind": "floating" } },
            { "name": "chat" }
        ],
        "rules": [
            { "class_name": "^Browser$", "rules": [ { "workspace": 2 } ] },
            { }
        ]
    }"#;

    fn setup(windows: Vec<NativeWindow>) -> (TestEnv, Registry, HotkeyManager) {
        let env = TestEnv::new(
            MockWindowSystem::new()
                .with_monitors(vec![create_test_monitor(0, 0, 0, 1920, 1080)])
                .with_windows(windows)
                .with_foreground(Some(1)),
        );
        let config = Config::from_json(CONFIG).unwrap();
        let mut registry = Registry::new(&config, env.system.monitors()).unwrap();
        registry.start(&env.host());
        env.manipulator.take_calls();
        env.drain_events();
        let (tx, _rx) = std_mpsc::channel();
        (env, registry, HotkeyManager::new(tx))
    }

    fn run_cmd(
        env: &TestEnv,
        registry: &mut Registry,
        hotkeys: &mut HotkeyManager,
        cmd: Command,
    ) -> CommandResult {
        process_command(registry, hotkeys, &env.host(), &cmd)
    }

    fn default_windows() -> Vec<NativeWindow> {
        vec![
            create_test_window(1, "Editor", "main.rs", "code"),
            create_test_window(2, "Browser", "Docs", "firefox"),
        ]
    }

    #[test]
    fn test_switch_to_workspace() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::SwitchToWorkspace { workspace: 2 },
        );
        assert!(matches!(result.response, Response::Ok));
        assert_eq!(registry.current_workspace_id(), 2);

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::SwitchToWorkspace { workspace: 9 },
        );
        assert!(matches!(result.response, Response::Error { .. }));

        run_cmd(&env, &mut registry, &mut hotkeys, Command::SwitchToPreviousWorkspace);
        assert_eq!(registry.current_workspace_id(), 1);
    }

    #[test]
    fn test_move_window_defaults_to_foreground() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::MoveWindow {
                window: None,
                to: 3,
                follow: false,
            },
        );
        assert!(matches!(result.response, Response::Ok));
        assert_eq!(registry.workspaces_of(1), &[3]);
        assert_eq!(registry.current_workspace_id(), 1);
    }

    #[test]
    fn test_move_window_to_previous_workspace() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());
        run_cmd(&env, &mut registry, &mut hotkeys, Command::SwitchToWorkspace { workspace: 2 });
        run_cmd(&env, &mut registry, &mut hotkeys, Command::SwitchToPreviousWorkspace);
        assert_eq!(registry.current_workspace_id(), 1);

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::MoveWindowToPreviousWorkspace { window: Some(1) },
        );
        assert!(matches!(result.response, Response::Ok));
        assert_eq!(registry.workspaces_of(1), &[2]);
    }

    #[test]
    fn test_move_unmanaged_window_is_error() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::MoveWindow {
                window: Some(99),
                to: 2,
                follow: true,
            },
        );
        match result.response {
            Response::Error { message } => assert!(message.contains("not managed")),
            other => panic!("Unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_add_and_remove_window() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::AddWindow {
                window: Some(1),
                to: 3,
            },
        );
        assert!(matches!(result.response, Response::Ok));
        assert_eq!(registry.workspaces_of(1), &[1, 3]);

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::RemoveWindow {
                window: Some(1),
                workspace: Some(3),
            },
        );
        assert!(matches!(result.response, Response::Ok));
        assert_eq!(registry.workspaces_of(1), &[1]);

        // the last instance stays
        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::RemoveWindow {
                window: Some(1),
                workspace: None,
            },
        );
        assert!(matches!(result.response, Response::Error { .. }));
    }

    #[test]
    fn test_toggle_floating_and_shift() {
        let (env, mut registry, mut hotkeys) = setup(vec![
            create_test_window(1, "Editor", "a", "code"),
            create_test_window(3, "Terminal", "b", "term"),
        ]);

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::ToggleFloating { window: None },
        );
        assert!(matches!(result.response, Response::Ok));
        assert!(registry.window(1).unwrap().is_floating);

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::ShiftWindow {
                window: Some(3),
                direction: ShiftDirection::Main,
            },
        );
        assert!(matches!(result.response, Response::Ok));
    }

    #[test]
    fn test_change_layout_and_layout_command() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::ChangeLayout {
                workspace: None,
                layout: LayoutKind::FullScreen,
            },
        );
        assert!(matches!(result.response, Response::Ok));
        assert_eq!(registry.current_workspace().layout_kind(), LayoutKind::FullScreen);

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::LayoutCommand {
                workspace: Some(3),
                cmd: "set-master-count".to_string(),
                args: vec!["2".to_string()],
            },
        );
        assert!(matches!(result.response, Response::Ok));

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::LayoutCommand {
                workspace: Some(2),
                cmd: "inc-master-count".to_string(),
                args: vec![],
            },
        );
        assert!(matches!(result.response, Response::Error { .. }));
    }

    #[test]
    fn test_queries() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());

        match run_cmd(&env, &mut registry, &mut hotkeys, Command::ListWorkspaces).response {
            Response::Workspaces { workspaces } => {
                assert_eq!(workspaces.len(), 3);
                assert_eq!(workspaces[1].name, "web");
                assert!(workspaces[0].is_current);
            }
            other => panic!("Unexpected response {:?}", other),
        }

        match run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::ListWindows { workspace: Some(2) },
        )
        .response
        {
            Response::Windows { windows } => {
                assert_eq!(windows.len(), 1);
                assert_eq!(windows[0].process_name, "firefox");
            }
            other => panic!("Unexpected response {:?}", other),
        }

        match run_cmd(&env, &mut registry, &mut hotkeys, Command::FocusedWindow).response {
            Response::WindowId { id } => assert_eq!(id, Some(1)),
            other => panic!("Unexpected response {:?}", other),
        }

        match run_cmd(&env, &mut registry, &mut hotkeys, Command::GetState).response {
            Response::State { state } => {
                assert_eq!(state.window_count, 2);
                assert_eq!(state.focused_window_id, Some(1));
            }
            other => panic!("Unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_bindings() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::Bind {
                key: "alt-3".to_string(),
                action: Box::new(Command::SwitchToWorkspace { workspace: 3 }),
            },
        );
        assert!(matches!(result.response, Response::Ok));

        match run_cmd(&env, &mut registry, &mut hotkeys, Command::ListBindings).response {
            Response::Bindings { bindings } => {
                assert_eq!(bindings.len(), 1);
                assert_eq!(bindings[0].key, "alt-3");
                assert!(bindings[0].action.contains("SwitchToWorkspace"));
            }
            other => panic!("Unexpected response {:?}", other),
        }

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::Bind {
                key: "hyper-3".to_string(),
                action: Box::new(Command::Quit),
            },
        );
        assert!(matches!(result.response, Response::Error { .. }));
    }

    #[test]
    fn test_exec_or_focus() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::ExecOrFocus {
                process_name: "Firefox".to_string(),
                command: "firefox.exe".to_string(),
            },
        );
        assert_eq!(result.effects, vec![Effect::FocusWindow { handle: 2 }]);

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::ExecOrFocus {
                process_name: "wezterm".to_string(),
                command: "wezterm.exe".to_string(),
            },
        );
        assert_eq!(
            result.effects,
            vec![Effect::ExecCommand {
                command: "wezterm.exe".to_string()
            }]
        );
    }

    #[test]
    fn test_no_foreground_window() {
        let (env, mut registry, mut hotkeys) = setup(default_windows());
        env.system.set_foreground(None);

        let result = run_cmd(
            &env,
            &mut registry,
            &mut hotkeys,
            Command::ToggleBorder { window: None },
        );
        assert!(matches!(result.response, Response::Error { .. }));
    }
}
