mod app;
mod core;
mod effect;
mod event;
mod event_emitter;
mod ipc;
mod layout;
mod platform;
mod shortcuts;
#[cfg(windows)]
mod win32;

use std::path::PathBuf;

use anyhow::{bail, Result};
use argh::FromArgs;
use fusuma_ipc::{Command, EventFilter, LayoutKind, Response, ShiftDirection};
use ipc::IpcClient;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fusuma - Windows tiling window manager
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Option<SubCommand>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommand {
    Start(StartCmd),
    Version(VersionCmd),
    Subscribe(SubscribeCmd),
    SwitchToWorkspace(SwitchToWorkspaceCmd),
    PreviousWorkspace(PreviousWorkspaceCmd),
    MoveWindow(MoveWindowCmd),
    MoveToPreviousWorkspace(MoveToPreviousWorkspaceCmd),
    AddWindow(AddWindowCmd),
    RemoveWindow(RemoveWindowCmd),
    SwitchToWindow(SwitchToWindowCmd),
    ToggleFloating(ToggleFloatingCmd),
    ToggleTitlebar(ToggleTitlebarCmd),
    ToggleBorder(ToggleBorderCmd),
    ToggleTaskbar(ToggleTaskbarCmd),
    ShiftWindow(ShiftWindowCmd),
    ChangeLayout(ChangeLayoutCmd),
    LayoutCmd(LayoutCmdCmd),
    Refresh(RefreshCmd),
    Bind(BindCmd),
    Unbind(UnbindCmd),
    ListBindings(ListBindingsCmd),
    ListWorkspaces(ListWorkspacesCmd),
    ListWindows(ListWindowsCmd),
    GetState(GetStateCmd),
    FocusedWindow(FocusedWindowCmd),
    Exec(ExecCmd),
    ExecOrFocus(ExecOrFocusCmd),
    Quit(QuitCmd),
}

/// Start the fusuma daemon
#[derive(FromArgs)]
#[argh(subcommand, name = "start")]
struct StartCmd {
    /// path to the config file (defaults to the user config directory)
    #[argh(option)]
    config: Option<PathBuf>,
}

/// Show version information
#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCmd {}

/// Print state events as JSON lines
#[derive(FromArgs)]
#[argh(subcommand, name = "subscribe")]
struct SubscribeCmd {
    /// send a full snapshot first
    #[argh(switch)]
    snapshot: bool,
    /// window events
    #[argh(switch)]
    window: bool,
    /// focus events
    #[argh(switch)]
    focus: bool,
    /// workspace events
    #[argh(switch)]
    workspace: bool,
    /// layout events
    #[argh(switch)]
    layout: bool,
}

/// Show a workspace on its monitor
#[derive(FromArgs)]
#[argh(subcommand, name = "switch-to-workspace")]
struct SwitchToWorkspaceCmd {
    /// workspace number (1-based)
    #[argh(positional)]
    workspace: usize,
}

/// Switch back to the previously current workspace
#[derive(FromArgs)]
#[argh(subcommand, name = "previous-workspace")]
struct PreviousWorkspaceCmd {}

/// Move a window to another workspace
#[derive(FromArgs)]
#[argh(subcommand, name = "move-window")]
struct MoveWindowCmd {
    /// destination workspace
    #[argh(positional)]
    to: usize,
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
    /// switch to the destination afterwards
    #[argh(switch)]
    follow: bool,
}

/// Move a window from the current workspace to the previous one
#[derive(FromArgs)]
#[argh(subcommand, name = "move-to-previous-workspace")]
struct MoveToPreviousWorkspaceCmd {
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
}

/// Also show a window on another workspace
#[derive(FromArgs)]
#[argh(subcommand, name = "add-window")]
struct AddWindowCmd {
    /// workspace to add the window to
    #[argh(positional)]
    to: usize,
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
}

/// Remove a window from one of its workspaces
#[derive(FromArgs)]
#[argh(subcommand, name = "remove-window")]
struct RemoveWindowCmd {
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
    /// workspace to remove it from (defaults to the current one)
    #[argh(option)]
    workspace: Option<usize>,
}

/// Bring a managed window forward, switching workspaces if needed
#[derive(FromArgs)]
#[argh(subcommand, name = "switch-to-window")]
struct SwitchToWindowCmd {
    /// window id
    #[argh(positional)]
    window: u64,
}

/// Toggle whether a window is laid out
#[derive(FromArgs)]
#[argh(subcommand, name = "toggle-floating")]
struct ToggleFloatingCmd {
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
}

/// Toggle a window's title bar
#[derive(FromArgs)]
#[argh(subcommand, name = "toggle-titlebar")]
struct ToggleTitlebarCmd {
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
}

/// Toggle a window's border
#[derive(FromArgs)]
#[argh(subcommand, name = "toggle-border")]
struct ToggleBorderCmd {
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
}

/// Toggle a window's taskbar button
#[derive(FromArgs)]
#[argh(subcommand, name = "toggle-taskbar")]
struct ToggleTaskbarCmd {
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
}

/// Move a window within the layout order
#[derive(FromArgs)]
#[argh(subcommand, name = "shift-window")]
struct ShiftWindowCmd {
    /// direction: next, previous, main
    #[argh(positional)]
    direction: String,
    /// window id (defaults to the foreground window)
    #[argh(option)]
    window: Option<u64>,
}

/// Replace a workspace's layout
#[derive(FromArgs)]
#[argh(subcommand, name = "change-layout")]
struct ChangeLayoutCmd {
    /// layout: tile, full-screen, floating
    #[argh(positional)]
    layout: String,
    /// workspace (defaults to the current one)
    #[argh(option)]
    workspace: Option<usize>,
}

/// Send a command to a workspace's layout
#[derive(FromArgs)]
#[argh(subcommand, name = "layout-cmd")]
struct LayoutCmdCmd {
    /// workspace (defaults to the current one)
    #[argh(option)]
    workspace: Option<usize>,
    /// layout command
    #[argh(positional)]
    cmd: String,
    /// command arguments
    #[argh(positional, greedy)]
    args: Vec<String>,
}

/// Reposition every visible workspace
#[derive(FromArgs)]
#[argh(subcommand, name = "refresh")]
struct RefreshCmd {}

/// Bind a hotkey to a command
#[derive(FromArgs)]
#[argh(subcommand, name = "bind")]
struct BindCmd {
    /// hotkey (e.g., alt-1, win-shift-h)
    #[argh(positional)]
    key: String,
    /// command and arguments to bind
    #[argh(positional, greedy)]
    action: Vec<String>,
}

/// Unbind a hotkey
#[derive(FromArgs)]
#[argh(subcommand, name = "unbind")]
struct UnbindCmd {
    /// hotkey to unbind
    #[argh(positional)]
    key: String,
}

/// List all hotkey bindings
#[derive(FromArgs)]
#[argh(subcommand, name = "list-bindings")]
struct ListBindingsCmd {}

/// List workspaces
#[derive(FromArgs)]
#[argh(subcommand, name = "list-workspaces")]
struct ListWorkspacesCmd {}

/// List managed windows
#[derive(FromArgs)]
#[argh(subcommand, name = "list-windows")]
struct ListWindowsCmd {
    /// only windows on this workspace
    #[argh(option)]
    workspace: Option<usize>,
}

/// Get current window manager state
#[derive(FromArgs)]
#[argh(subcommand, name = "get-state")]
struct GetStateCmd {}

/// Get the foreground window id
#[derive(FromArgs)]
#[argh(subcommand, name = "focused-window")]
struct FocusedWindowCmd {}

/// Execute a shell command
#[derive(FromArgs)]
#[argh(subcommand, name = "exec")]
struct ExecCmd {
    /// shell command to execute
    #[argh(positional)]
    command: String,
}

/// Focus a managed window of a process if there is one, otherwise run a command
#[derive(FromArgs)]
#[argh(subcommand, name = "exec-or-focus")]
struct ExecOrFocusCmd {
    /// process name to look for (e.g. firefox)
    #[argh(option)]
    process_name: String,
    /// shell command to execute if nothing matches
    #[argh(positional)]
    command: String,
}

/// Quit the fusuma daemon
#[derive(FromArgs)]
#[argh(subcommand, name = "quit")]
struct QuitCmd {}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    match cli.command {
        None => {
            // No subcommand - show help (simulate --help)
            let args: Vec<&str> = vec!["fusuma", "--help"];
            if let Err(e) = Cli::from_args(&args[..1], &args[1..]) {
                println!("{}", e.output);
            }
            Ok(())
        }
        Some(SubCommand::Start(cmd)) => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();

            tracing::info!("fusuma {} starting", VERSION);
            app::run(cmd.config)
        }
        Some(SubCommand::Version(_)) => {
            println!("fusuma {}", VERSION);
            Ok(())
        }
        Some(SubCommand::Subscribe(cmd)) => {
            let filter = EventFilter {
                window: cmd.window,
                focus: cmd.focus,
                workspace: cmd.workspace,
                layout: cmd.layout,
            };
            ipc::subscribe_and_print(cmd.snapshot, Some(filter))
        }
        Some(subcmd) => run_cli(subcmd),
    }
}

fn run_cli(subcmd: SubCommand) -> Result<()> {
    let cmd = to_command(subcmd)?;
    let mut client = IpcClient::connect()?;
    let response = client.send(&cmd)?;

    match response {
        Response::Ok => {}
        Response::Error { message } => {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
        Response::Workspaces { workspaces } => {
            for ws in workspaces {
                println!(
                    "{}: {} [{}] monitor={} windows={}{}{}",
                    ws.id,
                    ws.name,
                    ws.layout_symbol,
                    ws.monitor,
                    ws.window_count,
                    if ws.is_visible { " visible" } else { "" },
                    if ws.is_current { " *" } else { "" }
                );
            }
        }
        Response::Windows { windows } => {
            for w in windows {
                println!(
                    "{}: {} - {} [workspace={}, class={}]{}{}",
                    w.id,
                    w.process_name,
                    w.title,
                    w.workspace,
                    w.class_name,
                    if w.is_floating { " floating" } else { "" },
                    if w.is_focused { " *" } else { "" }
                );
            }
        }
        Response::State { state } => {
            println!("Current workspace: {}", state.current_workspace);
            println!("Previous workspace: {}", state.previous_workspace);
            println!("Focused window: {:?}", state.focused_window_id);
            println!("Window count: {}", state.window_count);
            println!("Workspace count: {}", state.workspace_count);
        }
        Response::Bindings { bindings } => {
            for b in bindings {
                println!("{} -> {}", b.key, b.action);
            }
        }
        Response::WindowId { id } => {
            if let Some(id) = id {
                println!("{}", id);
            } else {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn to_command(subcmd: SubCommand) -> Result<Command> {
    let cmd = match subcmd {
        SubCommand::Start(_) | SubCommand::Version(_) | SubCommand::Subscribe(_) => {
            bail!("This command cannot be sent to the daemon")
        }
        SubCommand::SwitchToWorkspace(cmd) => Command::SwitchToWorkspace {
            workspace: cmd.workspace,
        },
        SubCommand::PreviousWorkspace(_) => Command::SwitchToPreviousWorkspace,
        SubCommand::MoveWindow(cmd) => Command::MoveWindow {
            window: cmd.window,
            to: cmd.to,
            follow: cmd.follow,
        },
        SubCommand::MoveToPreviousWorkspace(cmd) => {
            Command::MoveWindowToPreviousWorkspace { window: cmd.window }
        }
        SubCommand::AddWindow(cmd) => Command::AddWindow {
            window: cmd.window,
            to: cmd.to,
        },
        SubCommand::RemoveWindow(cmd) => Command::RemoveWindow {
            window: cmd.window,
            workspace: cmd.workspace,
        },
        SubCommand::SwitchToWindow(cmd) => Command::SwitchToWindow { window: cmd.window },
        SubCommand::ToggleFloating(cmd) => Command::ToggleFloating { window: cmd.window },
        SubCommand::ToggleTitlebar(cmd) => Command::ToggleTitlebar { window: cmd.window },
        SubCommand::ToggleBorder(cmd) => Command::ToggleBorder { window: cmd.window },
        SubCommand::ToggleTaskbar(cmd) => Command::ToggleTaskbar { window: cmd.window },
        SubCommand::ShiftWindow(cmd) => Command::ShiftWindow {
            window: cmd.window,
            direction: parse_shift_direction(&cmd.direction)?,
        },
        SubCommand::ChangeLayout(cmd) => Command::ChangeLayout {
            workspace: cmd.workspace,
            layout: match LayoutKind::parse(&cmd.layout) {
                Some(layout) => layout,
                None => bail!(
                    "Unknown layout: {} (use tile, full-screen or floating)",
                    cmd.layout
                ),
            },
        },
        SubCommand::LayoutCmd(cmd) => Command::LayoutCommand {
            workspace: cmd.workspace,
            cmd: cmd.cmd,
            args: cmd.args,
        },
        SubCommand::Refresh(_) => Command::Refresh,
        SubCommand::Bind(cmd) => {
            if cmd.action.is_empty() {
                bail!("bind requires a command to bind");
            }
            Command::Bind {
                key: cmd.key,
                action: Box::new(parse_command(&cmd.action)?),
            }
        }
        SubCommand::Unbind(cmd) => Command::Unbind { key: cmd.key },
        SubCommand::ListBindings(_) => Command::ListBindings,
        SubCommand::ListWorkspaces(_) => Command::ListWorkspaces,
        SubCommand::ListWindows(cmd) => Command::ListWindows {
            workspace: cmd.workspace,
        },
        SubCommand::GetState(_) => Command::GetState,
        SubCommand::FocusedWindow(_) => Command::FocusedWindow,
        SubCommand::Exec(cmd) => Command::Exec {
            command: cmd.command,
        },
        SubCommand::ExecOrFocus(cmd) => Command::ExecOrFocus {
            process_name: cmd.process_name,
            command: cmd.command,
        },
        SubCommand::Quit(_) => Command::Quit,
    };
    Ok(cmd)
}

/// Parses the words after `bind <key>` with the same grammar as the CLI.
fn parse_command(args: &[String]) -> Result<Command> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match Cli::from_args(&["fusuma"], &args) {
        Ok(Cli {
            command: Some(subcmd),
        }) => to_command(subcmd),
        Ok(Cli { command: None }) => bail!("No command provided"),
        Err(e) => bail!("Invalid command '{}': {}", args.join(" "), e.output.trim()),
    }
}

fn parse_shift_direction(s: &str) -> Result<ShiftDirection> {
    match s.to_lowercase().as_str() {
        "next" => Ok(ShiftDirection::Next),
        "prev" | "previous" => Ok(ShiftDirection::Previous),
        "main" => Ok(ShiftDirection::Main),
        _ => bail!("Unknown direction: {} (use next, previous or main)", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_command_uses_cli_grammar() {
        match parse_command(&words("move-window 3 --follow")).unwrap() {
            Command::MoveWindow { window, to, follow } => {
                assert_eq!(window, None);
                assert_eq!(to, 3);
                assert!(follow);
            }
            other => panic!("Unexpected command {:?}", other),
        }
        match parse_command(&words("shift-window prev")).unwrap() {
            Command::ShiftWindow { direction, .. } => {
                assert_eq!(direction, ShiftDirection::Previous)
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_bind() {
        match parse_command(&words("bind alt-1 switch-to-workspace 1")).unwrap() {
            Command::Bind { key, action } => {
                assert_eq!(key, "alt-1");
                assert!(matches!(
                    *action,
                    Command::SwitchToWorkspace { workspace: 1 }
                ));
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_command_errors() {
        assert!(parse_command(&words("teleport")).is_err());
        assert!(parse_command(&words("change-layout spiral")).is_err());
        assert!(parse_command(&words("start")).is_err());
        assert!(parse_command(&[]).is_err());
    }
}
