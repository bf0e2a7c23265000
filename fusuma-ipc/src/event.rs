use serde::{Deserialize, Serialize};

use crate::{WindowInfo, WorkspaceInfo};

/// Which groups of events a subscriber wants. All `false` means everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Window lifecycle, title and flashing
    #[serde(default)]
    pub window: bool,
    #[serde(default)]
    pub focus: bool,
    /// Workspace visibility and activation
    #[serde(default)]
    pub workspace: bool,
    #[serde(default)]
    pub layout: bool,
}

/// Group an event belongs to for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Window,
    Focus,
    Workspace,
    Layout,
    /// Delivered regardless of the filter
    Snapshot,
}

impl EventFilter {
    pub fn all() -> Self {
        Self {
            window: true,
            focus: true,
            workspace: true,
            layout: true,
        }
    }

    pub fn matches(&self, event: &StateEvent) -> bool {
        match event.category() {
            EventCategory::Window => self.window,
            EventCategory::Focus => self.focus,
            EventCategory::Workspace => self.workspace,
            EventCategory::Layout => self.layout,
            EventCategory::Snapshot => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.window || self.focus || self.workspace || self.layout)
    }
}

/// First line a client sends on the event endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Send a `Snapshot` before any live event
    #[serde(default)]
    pub snapshot: bool,
    #[serde(default)]
    pub filter: EventFilter,
}

impl SubscribeRequest {
    /// The requested filter, widened to everything when nothing was selected.
    pub fn effective_filter(&self) -> EventFilter {
        if self.filter.is_empty() {
            EventFilter::all()
        } else {
            self.filter.clone()
        }
    }
}

/// Notifications consumed by status bars and other subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    WindowAdded {
        workspace: usize,
        window: WindowInfo,
    },
    WindowRemoved {
        workspace: usize,
        window_id: u64,
    },
    WindowMinimized {
        workspace: usize,
        window_id: u64,
    },
    WindowRestored {
        workspace: usize,
        window_id: u64,
    },
    WindowTitleChanged {
        window_id: u64,
        title: String,
    },
    WindowFlashing {
        window_id: u64,
    },

    WindowActivated {
        workspace: usize,
        window_id: Option<u64>,
    },

    WorkspaceShown {
        workspace: usize,
    },
    WorkspaceHidden {
        workspace: usize,
    },
    WorkspaceActivated {
        workspace: usize,
    },
    WorkspaceDeactivated {
        workspace: usize,
    },

    LayoutChanged {
        workspace: usize,
        layout: String,
        symbol: String,
    },

    /// Whole state, sent on request before live events
    Snapshot {
        workspaces: Vec<WorkspaceInfo>,
        windows: Vec<WindowInfo>,
        current_workspace: usize,
        focused_window_id: Option<u64>,
    },
}

impl StateEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            StateEvent::WindowAdded { .. }
            | StateEvent::WindowRemoved { .. }
            | StateEvent::WindowMinimized { .. }
            | StateEvent::WindowRestored { .. }
            | StateEvent::WindowTitleChanged { .. }
            | StateEvent::WindowFlashing { .. } => EventCategory::Window,
            StateEvent::WindowActivated { .. } => EventCategory::Focus,
            StateEvent::WorkspaceShown { .. }
            | StateEvent::WorkspaceHidden { .. }
            | StateEvent::WorkspaceActivated { .. }
            | StateEvent::WorkspaceDeactivated { .. } => EventCategory::Workspace,
            StateEvent::LayoutChanged { .. } => EventCategory::Layout,
            StateEvent::Snapshot { .. } => EventCategory::Snapshot,
        }
    }
}
