use std::time::Duration;

use crate::core::{style, Rect, Timing, WindowHandle, WindowPlacement};
use crate::event_emitter::EventEmitter;

/// Snapshot of a native top-level window as seen by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeWindow {
    pub handle: WindowHandle,
    pub class_name: String,
    pub title: String,
    pub process_name: String,
    pub style: u32,
    pub ex_style: u32,
    pub owner: Option<WindowHandle>,
    pub has_parent: bool,
    pub is_visible: bool,
}

impl NativeWindow {
    /// Visible, parentless and not a child window.
    pub fn is_app_window(&self) -> bool {
        self.is_visible && !self.has_parent && self.style & style::WS_CHILD == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub index: usize,
    pub name: String,
    pub bounds: Rect,
    pub working_area: Rect,
    pub is_primary: bool,
}

/// Trait for querying window and monitor information from the system.
/// This abstraction allows mocking in tests.
pub trait WindowSystem {
    fn window(&self, handle: WindowHandle) -> Option<NativeWindow>;
    fn styles(&self, handle: WindowHandle) -> Option<(u32, u32)>;
    /// Top-level windows in Z-order, topmost first.
    fn top_level_windows(&self) -> Vec<WindowHandle>;
    /// App windows whose owner chain leads to `owner`.
    fn owned_windows(&self, owner: WindowHandle) -> Vec<WindowHandle>;
    fn is_window(&self, handle: WindowHandle) -> bool;
    fn is_visible(&self, handle: WindowHandle) -> bool;
    fn is_iconic(&self, handle: WindowHandle) -> bool;
    fn is_zoomed(&self, handle: WindowHandle) -> bool;
    /// Liveness probe. Returns false when the window does not answer within `timeout`.
    fn is_responsive(&self, handle: WindowHandle, timeout: Duration) -> bool;
    fn foreground_window(&self) -> Option<WindowHandle>;
    /// The desktop shell window, which takes the foreground when a workspace is empty.
    fn shell_window(&self) -> Option<WindowHandle>;
    fn window_placement(&self, handle: WindowHandle) -> Option<WindowPlacement>;
    fn monitor_for_window(&self, handle: WindowHandle) -> Option<usize>;
    fn monitors(&self) -> Vec<MonitorInfo>;
    fn wait_for_input_idle(&self, handle: WindowHandle, timeout: Duration) -> bool;

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowCommand {
    Hide,
    ShowNoActivate,
    ShowNa,
    Minimize,
    ShowMinNoActive,
    Restore,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZOrder {
    #[default]
    Unchanged,
    Top,
    Bottom,
    Topmost,
    NoTopmost,
    After(WindowHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionFlags {
    pub show: bool,
    pub hide: bool,
    pub activate: bool,
    pub frame_changed: bool,
    pub z_order: ZOrder,
}

impl PositionFlags {
    /// Geometry only: frame changed, no activation, Z-order untouched.
    pub fn reposition() -> Self {
        Self {
            frame_changed: true,
            ..Default::default()
        }
    }

    pub fn show() -> Self {
        Self {
            show: true,
            ..Default::default()
        }
    }

    pub fn hide() -> Self {
        Self {
            hide: true,
            ..Default::default()
        }
    }

    pub fn z_order(z_order: ZOrder) -> Self {
        Self {
            z_order,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredPosition {
    pub handle: WindowHandle,
    pub rect: Option<Rect>,
    pub flags: PositionFlags,
}

/// A set of window placements applied to the OS as one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionBatch {
    entries: Vec<DeferredPosition>,
}

impl PositionBatch {
    pub fn begin(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn defer(&mut self, handle: WindowHandle, rect: Option<Rect>, flags: PositionFlags) {
        self.entries.push(DeferredPosition {
            handle,
            rect,
            flags,
        });
    }

    pub fn entries(&self) -> &[DeferredPosition] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DockEdge {
    Top,
    Bottom,
}

/// Trait for manipulating windows (side effects).
/// This abstraction allows mocking in tests.
pub trait WindowManipulator {
    fn commit(&self, batch: &PositionBatch);
    fn show_window(&self, handle: WindowHandle, cmd: ShowCommand);
    fn set_styles(&self, handle: WindowHandle, style: u32, ex_style: u32);
    fn redraw(&self, handle: WindowHandle);
    fn redraw_desktop(&self);
    fn set_window_placement(&self, handle: WindowHandle, placement: &WindowPlacement, show: bool);
    fn set_foreground(&self, handle: WindowHandle);
    fn close_window(&self, handle: WindowHandle);
    fn exec_command(&self, command: &str) -> Result<(), String>;
    fn notify_taskbar(&self, handle: WindowHandle, show: bool);
    /// Creates a hidden dock window that will reserve screen space once positioned.
    fn create_dock(&self, monitor: usize, edge: DockEdge, height: u32) -> Option<WindowHandle>;
    /// Requests the reservation and returns the rectangle granted by the OS.
    fn set_dock_position(
        &self,
        dock: WindowHandle,
        monitor: &MonitorInfo,
        edge: DockEdge,
        height: u32,
    ) -> Rect;
    /// Gives the reserved space back without destroying the dock.
    fn release_dock(&self, dock: WindowHandle);
    fn destroy_dock(&self, dock: WindowHandle);
}

/// Everything the core needs to talk to the outside world.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub system: &'a dyn WindowSystem,
    pub manipulator: &'a dyn WindowManipulator,
    pub events: &'a EventEmitter,
    pub timing: &'a Timing,
}

impl<'a> Host<'a> {
    pub fn new(
        system: &'a dyn WindowSystem,
        manipulator: &'a dyn WindowManipulator,
        events: &'a EventEmitter,
        timing: &'a Timing,
    ) -> Self {
        Self {
            system,
            manipulator,
            events,
            timing,
        }
    }

    pub fn is_responsive(&self, handle: WindowHandle) -> bool {
        let responsive = self
            .system
            .is_responsive(handle, self.timing.hung_window_timeout());
        if !responsive {
            tracing::debug!("Window {} is not responding, skipping", handle);
        }
        responsive
    }

    pub fn settle(&self, duration: Duration) {
        if !duration.is_zero() {
            self.system.sleep(duration);
        }
    }

    /// Brings `handle` to the foreground unless it already is or it hangs.
    pub fn force_foreground(&self, handle: WindowHandle) {
        if !self.is_responsive(handle) {
            return;
        }
        if self.system.foreground_window() != Some(handle) {
            self.manipulator.set_foreground(handle);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[test]
    fn test_app_window_predicate() {
        let mut info = create_test_window(1, "Notepad", "Untitled", "notepad");
        assert!(info.is_app_window());

        info.style |= style::WS_CHILD;
        assert!(!info.is_app_window());

        info.style &= !style::WS_CHILD;
        info.has_parent = true;
        assert!(!info.is_app_window());
    }

    #[test]
    fn test_position_batch_collects_entries() {
        let mut batch = PositionBatch::begin(2);
        assert!(batch.is_empty());
        batch.defer(1, Some(Rect::new(0, 0, 10, 10)), PositionFlags::reposition());
        batch.defer(2, None, PositionFlags::hide());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.entries()[1].handle, 2);
        assert!(batch.entries()[1].flags.hide);
    }

    #[test]
    fn test_mock_owned_windows_follow_owner_chain() {
        let mut dialog = create_test_window(2, "#32770", "Options", "app");
        dialog.owner = Some(1);
        let mut nested = create_test_window(3, "#32770", "Advanced", "app");
        nested.owner = Some(2);
        let system = MockWindowSystem::new().with_windows(vec![
            create_test_window(1, "App", "Main", "app"),
            dialog,
            nested,
            create_test_window(4, "Other", "Other", "other"),
        ]);

        assert_eq!(system.owned_windows(1), vec![2, 3]);
        assert!(system.owned_windows(4).is_empty());
    }

    #[test]
    fn test_host_probe_skips_hung_window() {
        let env = TestEnv::new(
            MockWindowSystem::new().with_windows(vec![create_test_window(1, "A", "A", "a")]),
        );
        assert!(env.host().is_responsive(1));
        env.system.set_hung(1, true);
        assert!(!env.host().is_responsive(1));
        assert!(!env.host().is_responsive(99));
    }

    #[test]
    fn test_force_foreground_skips_current_and_hung() {
        let env = TestEnv::new(
            MockWindowSystem::new()
                .with_windows(vec![
                    create_test_window(1, "A", "A", "a"),
                    create_test_window(2, "B", "B", "b"),
                ])
                .with_foreground(Some(1)),
        );
        env.host().force_foreground(1);
        env.system.set_hung(2, true);
        env.host().force_foreground(2);
        assert!(env.manipulator.foreground_calls().is_empty());

        env.system.set_hung(2, false);
        env.host().force_foreground(2);
        assert_eq!(env.manipulator.foreground_calls(), vec![2]);
    }

    #[test]
    fn test_settle_records_sleep_without_blocking() {
        let env = TestEnv::new(MockWindowSystem::new());
        env.host().settle(Duration::from_millis(100));
        env.host().settle(Duration::ZERO);
        assert_eq!(env.system.total_slept(), Duration::from_millis(100));
    }
}
