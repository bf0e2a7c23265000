use crate::core::{Window, WindowHandle, Workspace, WorkspaceId};
use fusuma_ipc::{StateEvent, WindowInfo, WorkspaceInfo};
use std::sync::mpsc as std_mpsc;

/// Main-loop side of the notification stream. Events are queued to the
/// tokio thread, which fans them out to subscribers.
pub struct EventEmitter {
    tx: std_mpsc::Sender<StateEvent>,
}

impl EventEmitter {
    pub fn new(tx: std_mpsc::Sender<StateEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: StateEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("Failed to emit event (no receivers?): {}", e);
        }
    }

    pub fn emit_window_added(
        &self,
        workspace: WorkspaceId,
        window: &Window,
        focused: Option<WindowHandle>,
    ) {
        self.emit(StateEvent::WindowAdded {
            workspace,
            window: window_to_info(window, workspace, focused),
        });
    }

    pub fn emit_window_removed(&self, workspace: WorkspaceId, window_id: WindowHandle) {
        self.emit(StateEvent::WindowRemoved {
            workspace,
            window_id,
        });
    }

    pub fn emit_window_minimized(&self, workspace: WorkspaceId, window_id: WindowHandle) {
        self.emit(StateEvent::WindowMinimized {
            workspace,
            window_id,
        });
    }

    pub fn emit_window_restored(&self, workspace: WorkspaceId, window_id: WindowHandle) {
        self.emit(StateEvent::WindowRestored {
            workspace,
            window_id,
        });
    }

    pub fn emit_window_title_changed(&self, window_id: WindowHandle, title: &str) {
        self.emit(StateEvent::WindowTitleChanged {
            window_id,
            title: title.to_string(),
        });
    }

    pub fn emit_window_flashing(&self, window_id: WindowHandle) {
        self.emit(StateEvent::WindowFlashing { window_id });
    }

    /// Also serves as the "window order changed" notification.
    pub fn emit_window_activated(&self, workspace: WorkspaceId, window_id: Option<WindowHandle>) {
        self.emit(StateEvent::WindowActivated {
            workspace,
            window_id,
        });
    }

    pub fn emit_workspace_shown(&self, workspace: WorkspaceId) {
        self.emit(StateEvent::WorkspaceShown { workspace });
    }

    pub fn emit_workspace_hidden(&self, workspace: WorkspaceId) {
        self.emit(StateEvent::WorkspaceHidden { workspace });
    }

    pub fn emit_workspace_activated(&self, workspace: WorkspaceId) {
        self.emit(StateEvent::WorkspaceActivated { workspace });
    }

    pub fn emit_workspace_deactivated(&self, workspace: WorkspaceId) {
        self.emit(StateEvent::WorkspaceDeactivated { workspace });
    }

    pub fn emit_layout_changed(&self, workspace: WorkspaceId, layout: &str, symbol: &str) {
        self.emit(StateEvent::LayoutChanged {
            workspace,
            layout: layout.to_string(),
            symbol: symbol.to_string(),
        });
    }
}

/// Convert a Window instance to WindowInfo
pub fn window_to_info(
    window: &Window,
    workspace: WorkspaceId,
    focused: Option<WindowHandle>,
) -> WindowInfo {
    WindowInfo {
        id: window.handle,
        workspace,
        title: window.display_name.clone(),
        class_name: window.class_name.clone(),
        process_name: window.process_name.clone(),
        is_floating: window.is_floating,
        is_minimized: window.is_minimized,
        is_shared: window.is_shared(),
        is_focused: focused == Some(window.handle),
    }
}

/// Convert a Workspace to WorkspaceInfo
pub fn workspace_to_info(workspace: &Workspace) -> WorkspaceInfo {
    WorkspaceInfo {
        id: workspace.id,
        name: workspace.name.clone(),
        monitor: workspace.monitor,
        layout: workspace.layout_name().to_string(),
        layout_symbol: workspace.layout_symbol(),
        window_count: workspace.windows().len(),
        is_visible: workspace.is_visible,
        is_current: workspace.is_current,
    }
}
