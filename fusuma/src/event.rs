use crate::core::WindowHandle;

/// Native notifications delivered to the main loop. Any of them may arrive
/// twice, late, or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    WindowCreated(WindowHandle),
    WindowDestroyed(WindowHandle),
    WindowShown(WindowHandle),
    WindowHidden(WindowHandle),
    MinimizeStart(WindowHandle),
    MinimizeEnd(WindowHandle),
    /// `None` when the foreground moved to a window with no identity (the desktop).
    WindowActivated(Option<WindowHandle>),
    WindowFlashing(WindowHandle),
    TitleChanged(WindowHandle),
    IconChanged(WindowHandle),
    DockPositionChanged(WindowHandle),
    FullScreenOpened { monitor: usize },
    FullScreenClosed { monitor: usize },
    DisplaySettingsChanged,
    /// The window behind `old` was recreated as `new`.
    WindowReplaced { old: WindowHandle, new: WindowHandle },
}

impl NativeEvent {
    pub fn handle(&self) -> Option<WindowHandle> {
        match self {
            NativeEvent::WindowCreated(h)
            | NativeEvent::WindowDestroyed(h)
            | NativeEvent::WindowShown(h)
            | NativeEvent::WindowHidden(h)
            | NativeEvent::MinimizeStart(h)
            | NativeEvent::MinimizeEnd(h)
            | NativeEvent::WindowFlashing(h)
            | NativeEvent::TitleChanged(h)
            | NativeEvent::IconChanged(h)
            | NativeEvent::DockPositionChanged(h) => Some(*h),
            NativeEvent::WindowActivated(h) => *h,
            NativeEvent::WindowReplaced { new, .. } => Some(*new),
            NativeEvent::FullScreenOpened { .. }
            | NativeEvent::FullScreenClosed { .. }
            | NativeEvent::DisplaySettingsChanged => None,
        }
    }
}
