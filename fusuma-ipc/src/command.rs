use serde::{Deserialize, Serialize};

/// Commands accepted by the daemon. Window arguments left as `None`
/// refer to the current foreground window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    // Workspace operations
    SwitchToWorkspace {
        workspace: usize,
    },
    SwitchToPreviousWorkspace,
    MoveWindow {
        window: Option<u64>,
        to: usize,
        #[serde(default)]
        follow: bool,
    },
    MoveWindowToPreviousWorkspace {
        window: Option<u64>,
    },
    AddWindow {
        window: Option<u64>,
        to: usize,
    },
    RemoveWindow {
        window: Option<u64>,
        workspace: Option<usize>,
    },

    // Window operations
    SwitchToWindow {
        window: u64,
    },
    ToggleFloating {
        window: Option<u64>,
    },
    ToggleTitlebar {
        window: Option<u64>,
    },
    ToggleBorder {
        window: Option<u64>,
    },
    ToggleTaskbar {
        window: Option<u64>,
    },
    ShiftWindow {
        window: Option<u64>,
        direction: ShiftDirection,
    },

    // Layout operations
    ChangeLayout {
        workspace: Option<usize>,
        layout: LayoutKind,
    },
    LayoutCommand {
        workspace: Option<usize>,
        cmd: String,
        args: Vec<String>,
    },
    Refresh,

    // Keybinding operations
    Bind {
        key: String,
        action: Box<Command>,
    },
    Unbind {
        key: String,
    },
    ListBindings,

    // Queries
    ListWorkspaces,
    ListWindows {
        workspace: Option<usize>,
    },
    GetState,
    FocusedWindow,

    // Exec
    Exec {
        command: String,
    },
    ExecOrFocus {
        process_name: String,
        command: String,
    },

    // Control
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftDirection {
    Next,
    Previous,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Tile,
    FullScreen,
    Floating,
}

impl LayoutKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tile" => Some(LayoutKind::Tile),
            "full-screen" | "full_screen" | "fullscreen" => Some(LayoutKind::FullScreen),
            "floating" | "float" => Some(LayoutKind::Floating),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Error { message: String },
    Workspaces { workspaces: Vec<WorkspaceInfo> },
    Windows { windows: Vec<WindowInfo> },
    State { state: StateInfo },
    Bindings { bindings: Vec<BindingInfo> },
    WindowId { id: Option<u64> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingInfo {
    pub key: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: u64,
    pub workspace: usize,
    pub title: String,
    pub class_name: String,
    pub process_name: String,
    pub is_floating: bool,
    pub is_minimized: bool,
    pub is_shared: bool,
    pub is_focused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub id: usize,
    pub name: String,
    pub monitor: usize,
    pub layout: String,
    pub layout_symbol: String,
    pub window_count: usize,
    pub is_visible: bool,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateInfo {
    pub current_workspace: usize,
    pub previous_workspace: usize,
    pub focused_window_id: Option<u64>,
    pub window_count: usize,
    pub workspace_count: usize,
}
