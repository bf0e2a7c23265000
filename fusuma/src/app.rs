mod channels;
mod command;
mod dispatch;
mod effects;

use std::path::PathBuf;

use anyhow::{Context, Result};
use fusuma_ipc::Command;

use crate::core::{Config, Registry};
use crate::platform::Host;
use crate::shortcuts::{Chord, HotkeyManager};

pub use channels::{
    create_channels, run_async, IpcCommandWithResponse, LoopSender, LoopWaker, MainChannels,
    SnapshotRequest, TokioChannels,
};
use dispatch::dispatch_command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// Main-thread half of the daemon: the registry, the key bindings and the
/// receiving ends of every channel feeding the loop.
pub struct App {
    registry: Registry,
    hotkeys: HotkeyManager,
    channels: MainChannels,
}

impl App {
    pub fn new(config: &Config, host: &Host, channels: MainChannels) -> Result<Self> {
        let registry = Registry::new(config, host.system.monitors())
            .map_err(anyhow::Error::msg)
            .context("Failed to set up workspaces")?;

        let mut hotkeys = HotkeyManager::new(channels.hotkey_cmd_tx.clone());
        for binding in &config.bindings {
            hotkeys
                .bind(&binding.key, binding.command.clone())
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid binding '{}'", binding.key))?;
        }

        Ok(Self {
            registry,
            hotkeys,
            channels,
        })
    }

    pub fn start(&mut self, host: &Host) {
        self.registry.start(host);
        tracing::info!(
            "Managing {} windows on {} workspaces",
            self.registry.window_count(),
            self.registry.workspaces.len()
        );
    }

    /// Drains everything queued for the main loop: native notifications,
    /// bound commands, IPC commands and snapshot requests.
    pub fn process_pending(&mut self, host: &Host) -> LoopControl {
        while let Ok(event) = self.channels.native_event_rx.try_recv() {
            self.registry.handle_event(host, event);
        }

        while let Ok(cmd) = self.channels.hotkey_cmd_rx.try_recv() {
            tracing::debug!("Hotkey command: {:?}", cmd);
            let response = dispatch_command(&cmd, &mut self.registry, &mut self.hotkeys, host);
            if let fusuma_ipc::Response::Error { message } = response {
                tracing::warn!("Hotkey command failed: {}", message);
            }
            if matches!(cmd, Command::Quit) {
                return LoopControl::Quit;
            }
        }

        while let Ok((cmd, resp_tx)) = self.channels.ipc_cmd_rx.try_recv() {
            tracing::debug!("Received IPC command: {:?}", cmd);
            let response = dispatch_command(&cmd, &mut self.registry, &mut self.hotkeys, host);
            let _ = resp_tx.blocking_send(response);

            // Handle Quit command after sending response
            if matches!(cmd, Command::Quit) {
                return LoopControl::Quit;
            }
        }

        while let Ok(request) = self.channels.snapshot_request_rx.try_recv() {
            let snapshot = self.registry.snapshot(host.system.foreground_window());
            let _ = request.send(snapshot);
        }

        LoopControl::Continue
    }

    /// Called from the keyboard hook and for OS hotkeys. Only posts.
    pub fn handle_key(&self, chord: &Chord) -> bool {
        self.hotkeys.dispatch(chord)
    }

    pub fn hotkeys(&self) -> &HotkeyManager {
        &self.hotkeys
    }

    pub fn take_hotkeys_changed(&mut self) -> bool {
        self.hotkeys.take_changed()
    }

    /// Sender the native hooks deliver into.
    pub fn native_event_sender(&self) -> std::sync::mpsc::Sender<crate::event::NativeEvent> {
        self.channels.native_event_tx.clone()
    }

    pub fn shutdown(&mut self, host: &Host) {
        tracing::info!("Shutting down, restoring windows");
        self.registry.revert_all(host);
    }
}

pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path().context("Cannot determine the config directory")?,
    };
    let config = Config::load(&path)?;
    run_platform(config)
}

#[cfg(windows)]
fn run_platform(config: Config) -> Result<()> {
    crate::win32::run(config)
}

#[cfg(not(windows))]
fn run_platform(_config: Config) -> Result<()> {
    anyhow::bail!("fusuma manages Windows desktops and cannot run on this platform")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NativeEvent;
    use crate::platform::mock::*;
    use crate::platform::ShowCommand;
    use crate::shortcuts::Modifiers;
    use fusuma_ipc::{Response, StateEvent};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    const CONFIG: &str = r#"{
        "workspaces": [ { "name": "one" }, { "name": "two" } ],
        "rules": [ { } ],
        "bindings": [
            { "key": "alt-2", "command": { "type": "switch_to_workspace", "workspace": 2 } },
            { "key": "alt-shift-q", "command": { "type": "quit" } }
        ]
    }"#;

    fn setup() -> (TestEnv, App, TokioChannels) {
        let env = TestEnv::new(
            MockWindowSystem::new()
                .with_monitors(vec![create_test_monitor(0, 0, 0, 1920, 1080)])
                .with_windows(vec![create_test_window(1, "Editor", "a", "code")]),
        );
        let (tokio_channels, main_channels) = create_channels(Arc::new(|| {}));
        let config = Config::from_json(CONFIG).unwrap();
        let mut app = App::new(&config, &env.host(), main_channels).unwrap();
        app.start(&env.host());
        (env, app, tokio_channels)
    }

    fn send_ipc(channels: &TokioChannels, cmd: Command) -> mpsc::Receiver<Response> {
        let (resp_tx, resp_rx) = mpsc::channel(1);
        channels.commands.send((cmd, resp_tx)).unwrap();
        resp_rx
    }

    #[test]
    fn test_new_rejects_invalid_binding() {
        let env = TestEnv::new(
            MockWindowSystem::new().with_monitors(vec![create_test_monitor(0, 0, 0, 800, 600)]),
        );
        let (_tokio_channels, main_channels) = create_channels(Arc::new(|| {}));
        let config = Config::from_json(
            r#"{ "workspaces": [ {} ], "bindings": [ { "key": "meta-x", "command": { "type": "quit" } } ] }"#,
        )
        .unwrap();
        let err = App::new(&config, &env.host(), main_channels).err().unwrap();
        assert!(format!("{:#}", err).contains("meta-x"));
    }

    #[test]
    fn test_ipc_command_gets_response() {
        let (env, mut app, channels) = setup();
        let mut resp_rx = send_ipc(&channels, Command::SwitchToWorkspace { workspace: 2 });

        assert_eq!(app.process_pending(&env.host()), LoopControl::Continue);
        assert!(matches!(resp_rx.try_recv().unwrap(), Response::Ok));
        assert_eq!(app.registry.current_workspace_id(), 2);
    }

    #[test]
    fn test_quit_stops_loop_after_responding() {
        let (env, mut app, channels) = setup();
        let mut quit_rx = send_ipc(&channels, Command::Quit);
        let mut later_rx = send_ipc(&channels, Command::GetState);

        assert_eq!(app.process_pending(&env.host()), LoopControl::Quit);
        assert!(matches!(quit_rx.try_recv().unwrap(), Response::Ok));
        assert!(later_rx.try_recv().is_err());
    }

    #[test]
    fn test_hotkey_posts_command_to_loop() {
        let (env, mut app, _channels) = setup();
        assert!(app.take_hotkeys_changed());

        assert!(app.handle_key(&Chord::new(0x32, Modifiers::L_ALT)));
        assert_eq!(app.registry.current_workspace_id(), 1);
        app.process_pending(&env.host());
        assert_eq!(app.registry.current_workspace_id(), 2);

        assert!(!app.handle_key(&Chord::new(0x33, Modifiers::L_ALT)));
        assert!(app.handle_key(&Chord::new(0x51, Modifiers::L_ALT | Modifiers::R_SHIFT)));
        assert_eq!(app.process_pending(&env.host()), LoopControl::Quit);
    }

    #[test]
    fn test_native_events_reach_registry() {
        let (env, mut app, _channels) = setup();
        env.system
            .add_window(create_test_window(2, "Terminal", "b", "term"));
        app.native_event_sender()
            .send(NativeEvent::WindowCreated(2))
            .unwrap();

        app.process_pending(&env.host());
        assert_eq!(app.registry.workspaces_of(2), &[1]);
    }

    #[test]
    fn test_snapshot_request_answered() {
        let (env, mut app, channels) = setup();
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        channels.snapshot_requests.send(tx).unwrap();

        app.process_pending(&env.host());
        match rx.try_recv().unwrap() {
            StateEvent::Snapshot { workspaces, .. } => assert_eq!(workspaces.len(), 2),
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_restores_windows() {
        let (env, mut app, _channels) = setup();
        env.manipulator.take_calls();
        app.shutdown(&env.host());
        assert!(env
            .manipulator
            .shown_commands(1)
            .contains(&ShowCommand::ShowNa));
    }
}
