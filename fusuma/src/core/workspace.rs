use fusuma_ipc::{LayoutKind, ShiftDirection};

use super::{Window, WindowHandle, WorkspaceConfig, WorkspaceId};
use crate::layout::{self, Area, Layout};
use crate::platform::{Host, PositionBatch, PositionFlags, ZOrder};

/// A virtual desktop: an ordered set of windows and one layout.
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub monitor: usize,
    pub top_bars: Vec<String>,
    pub bottom_bars: Vec<String>,
    pub reposition_on_switched_to: bool,
    pub is_visible: bool,
    pub is_current: bool,
    /// Set when the managed set changed while invisible; consumed by `switch_to`.
    pub has_changes: bool,
    /// Z-order, topmost first.
    windows: Vec<Window>,
    /// Tiling order of the managed windows.
    managed: Vec<WindowHandle>,
    shared: Vec<WindowHandle>,
    removed_shared: Vec<WindowHandle>,
    layout: Box<dyn Layout>,
    area: Area,
}

fn collect_managed<'a>(windows: &'a [Window], order: &[WindowHandle]) -> Vec<&'a Window> {
    order
        .iter()
        .filter_map(|h| windows.iter().find(|w| w.handle == *h))
        .collect()
}

impl Workspace {
    pub fn new(id: WorkspaceId, name: String, monitor: usize, layout: Box<dyn Layout>) -> Self {
        Self {
            id,
            name,
            monitor,
            top_bars: Vec::new(),
            bottom_bars: Vec::new(),
            reposition_on_switched_to: false,
            is_visible: false,
            is_current: false,
            has_changes: false,
            windows: Vec::new(),
            managed: Vec::new(),
            shared: Vec::new(),
            removed_shared: Vec::new(),
            layout,
            area: Area::default(),
        }
    }

    pub fn from_config(id: WorkspaceId, config: &WorkspaceConfig) -> Self {
        let name = if config.name.is_empty() {
            id.to_string()
        } else {
            config.name.clone()
        };
        let mut workspace = Self::new(id, name, config.monitor, layout::from_config(&config.layout));
        workspace.top_bars = config.top_bars.clone();
        workspace.bottom_bars = config.bottom_bars.clone();
        workspace.reposition_on_switched_to = config.reposition_on_switched_to;
        workspace
    }

    pub fn area(&self) -> Area {
        self.area
    }

    pub fn set_area(&mut self, area: Area) {
        if self.area != area {
            self.area = area;
            self.has_changes = true;
        }
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn window(&self, handle: WindowHandle) -> Option<&Window> {
        self.windows.iter().find(|w| w.handle == handle)
    }

    pub fn window_mut(&mut self, handle: WindowHandle) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.handle == handle)
    }

    pub fn contains(&self, handle: WindowHandle) -> bool {
        self.window(handle).is_some()
    }

    /// Managed windows in tiling order.
    pub fn managed_windows(&self) -> Vec<&Window> {
        collect_managed(&self.windows, &self.managed)
    }

    pub fn shared_windows(&self) -> Vec<&Window> {
        collect_managed(&self.windows, &self.shared)
    }

    /// The top of the Z-order, unless it is minimized.
    pub fn topmost_window(&self) -> Option<&Window> {
        self.windows.first().filter(|w| !w.is_minimized)
    }

    pub fn layout_kind(&self) -> LayoutKind {
        self.layout.kind()
    }

    pub fn layout_name(&self) -> &'static str {
        self.layout.name()
    }

    pub fn layout_symbol(&self) -> String {
        self.layout.symbol(self.managed.len())
    }

    pub fn needs_reposition(&self) -> bool {
        self.has_changes || self.reposition_on_switched_to
    }

    /// Windows are inserted at the front while enumerating top-down at startup,
    /// so the list has to be reversed once enumeration is over.
    pub fn initialize(&mut self) {
        self.windows.reverse();
        self.managed.reverse();
    }

    pub fn window_created(&mut self, host: &Host, window: Window) {
        let handle = window.handle;
        if self.contains(handle) {
            tracing::warn!("Window {} is already on workspace {}", handle, self.id);
            return;
        }

        if window.is_shared() {
            self.shared.push(handle);
        }
        if self.is_visible || !window.is_shared() {
            window.initialize(host);
        }
        let managed = window.is_managed();
        self.windows.insert(0, window);

        if managed {
            self.managed.insert(0, handle);
            let relayout = self.is_visible;
            let windows = collect_managed(&self.windows, &self.managed);
            self.layout
                .window_created(host, &self.windows[0], &windows, self.area, relayout);
            self.has_changes |= !relayout;
        }

        tracing::debug!("Window {} added to workspace {}", handle, self.id);
        host.events
            .emit_window_added(self.id, &self.windows[0], host.system.foreground_window());
    }

    /// Removes the instance of `handle` and returns it.
    pub fn window_destroyed(
        &mut self,
        host: &Host,
        handle: WindowHandle,
        set_foreground: bool,
    ) -> Option<Window> {
        let index = self.windows.iter().position(|w| w.handle == handle)?;
        let window = self.windows.remove(index);
        self.shared.retain(|&h| h != handle);
        self.removed_shared.retain(|&h| h != handle);

        if let Some(pos) = self.managed.iter().position(|&h| h == handle) {
            self.managed.remove(pos);
            let relayout = self.is_visible;
            let windows = collect_managed(&self.windows, &self.managed);
            self.layout
                .window_destroyed(host, &window, &windows, self.area, relayout);
            self.has_changes |= !relayout;
        }

        if self.is_current && set_foreground {
            self.set_foreground(host);
        }

        tracing::debug!("Window {} removed from workspace {}", handle, self.id);
        host.events.emit_window_removed(self.id, handle);
        Some(window)
    }

    pub fn window_minimized(&mut self, host: &Host, handle: WindowHandle) {
        if !self.move_to_bottom(handle) {
            return;
        }
        if let Some(window) = self.windows.last_mut() {
            window.is_minimized = true;
        }

        if let Some(pos) = self.managed.iter().position(|&h| h == handle) {
            self.managed.remove(pos);
            self.notify_layout(handle, |layout, window, windows, area, relayout| {
                layout.window_minimized(host, window, windows, area, relayout)
            });
        }

        host.events.emit_window_minimized(self.id, handle);
    }

    pub fn window_restored(&mut self, host: &Host, handle: WindowHandle) {
        if !self.move_to_top(handle) {
            return;
        }
        self.windows[0].is_minimized = false;

        if !self.windows[0].is_floating && !self.managed.contains(&handle) {
            self.managed.insert(0, handle);
            self.notify_layout(handle, |layout, window, windows, area, relayout| {
                layout.window_restored(host, window, windows, area, relayout)
            });
        }

        host.events.emit_window_restored(self.id, handle);
    }

    /// Moves the activated window to the top of the Z-order.
    ///
    /// Minimize and restore notifications are sometimes never delivered, so
    /// after a short settle delay the iconic state of the affected window is
    /// read back and a missing transition is synthesized.
    pub fn window_activated(&mut self, host: &Host, handle: Option<WindowHandle>) {
        let delay = host.timing.minimize_restore_delay();
        match handle {
            None => {
                if let Some(top) = self.windows.first().filter(|w| !w.is_minimized) {
                    let top = top.handle;
                    host.settle(delay);
                    if host.system.is_iconic(top) {
                        self.window_minimized(host, top);
                    }
                }
            }
            Some(h) if self.move_to_top(h) => {
                if self.windows[0].is_minimized {
                    host.settle(delay);
                    if !host.system.is_iconic(h) {
                        self.window_restored(host, h);
                        return;
                    }
                } else if let Some(second) = self.windows.get(1).filter(|w| !w.is_minimized) {
                    let second = second.handle;
                    host.settle(delay);
                    if host.system.is_iconic(second) {
                        self.window_minimized(host, second);
                    }
                }
            }
            Some(_) => {}
        }

        host.events.emit_window_activated(self.id, handle);
    }

    pub fn toggle_window_floating(&mut self, host: &Host, handle: WindowHandle) -> bool {
        let Some(window) = self.window_mut(handle) else {
            return false;
        };
        window.is_floating = !window.is_floating;
        let (floating, minimized) = (window.is_floating, window.is_minimized);
        tracing::info!(
            "Window {} on workspace {} is now {}",
            handle,
            self.id,
            if floating { "floating" } else { "tiled" }
        );
        if minimized {
            return true;
        }

        let relayout = self.is_visible;
        if floating {
            self.managed.retain(|&h| h != handle);
        } else {
            self.managed.insert(0, handle);
        }
        let windows = collect_managed(&self.windows, &self.managed);
        if let Some(window) = self.windows.iter().find(|w| w.handle == handle) {
            if floating {
                self.layout
                    .window_destroyed(host, window, &windows, self.area, relayout);
            } else {
                self.layout
                    .window_created(host, window, &windows, self.area, relayout);
            }
        }
        self.has_changes |= !relayout;
        true
    }

    pub fn toggle_titlebar(&mut self, host: &Host, handle: WindowHandle) -> bool {
        let Some(window) = self.window_mut(handle) else {
            return false;
        };
        window.toggle_titlebar(host);
        if self.managed.contains(&handle) {
            self.notify_layout(handle, |layout, window, _, area, relayout| {
                layout.window_titlebar_toggled(host, window, area, relayout)
            });
        }
        true
    }

    pub fn toggle_border(&mut self, host: &Host, handle: WindowHandle) -> bool {
        let Some(window) = self.window_mut(handle) else {
            return false;
        };
        window.toggle_border(host);
        if self.managed.contains(&handle) {
            self.notify_layout(handle, |layout, window, _, area, relayout| {
                layout.window_border_toggled(host, window, area, relayout)
            });
        }
        true
    }

    pub fn toggle_taskbar(&mut self, host: &Host, handle: WindowHandle) -> bool {
        match self.window_mut(handle) {
            Some(window) => {
                window.toggle_taskbar(host);
                true
            }
            None => false,
        }
    }

    /// Replaces the layout unless it has the same name as the active one.
    pub fn change_layout(&mut self, host: &Host, layout: Box<dyn Layout>) -> bool {
        if layout.name() == self.layout.name() {
            return false;
        }
        tracing::info!(
            "Workspace {} layout: {} -> {}",
            self.id,
            self.layout.name(),
            layout.name()
        );
        self.layout = layout;
        self.reposition_or_mark(host);
        host.events
            .emit_layout_changed(self.id, self.layout.name(), &self.layout_symbol());
        true
    }

    pub fn layout_command(&mut self, host: &Host, cmd: &str, args: &[String]) -> Result<(), String> {
        if self.layout.command(cmd, args)? {
            self.reposition_or_mark(host);
        }
        host.events
            .emit_layout_changed(self.id, self.layout.name(), &self.layout_symbol());
        Ok(())
    }

    pub fn reposition(&mut self, host: &Host) {
        let windows = collect_managed(&self.windows, &self.managed);
        self.layout.reposition(host, &windows, self.area);
        self.has_changes = false;
    }

    fn reposition_or_mark(&mut self, host: &Host) {
        if self.is_visible {
            self.reposition(host);
        } else {
            self.has_changes = true;
        }
    }

    /// Moves a managed window within the tiling order.
    pub fn shift_window(&mut self, host: &Host, handle: WindowHandle, direction: ShiftDirection) -> bool {
        let Some(pos) = self.managed.iter().position(|&h| h == handle) else {
            return false;
        };
        let len = self.managed.len();
        let target = match direction {
            ShiftDirection::Next => (pos + 1) % len,
            ShiftDirection::Previous => (pos + len - 1) % len,
            ShiftDirection::Main => 0,
        };
        if target == pos {
            return false;
        }

        match direction {
            ShiftDirection::Main => {
                let h = self.managed.remove(pos);
                self.managed.insert(0, h);
            }
            _ => self.managed.swap(pos, target),
        }
        self.reposition_or_mark(host);
        true
    }

    /// Activates the topmost non-minimized window, or the shell when there is none.
    pub fn set_foreground(&self, host: &Host) {
        if let Some(window) = self.topmost_window() {
            host.force_foreground(window.handle);
        } else if let Some(shell) = host.system.shell_window() {
            host.force_foreground(shell);
        }
    }

    pub fn set_current(&mut self, host: &Host, current: bool) {
        if self.is_current == current {
            return;
        }
        self.is_current = current;
        if current {
            host.events.emit_workspace_activated(self.id);
        } else {
            host.events.emit_workspace_deactivated(self.id);
        }
    }

    fn should_restore_shared_position(&self, window: &Window) -> bool {
        !self.needs_reposition()
            || window.is_floating
            || self.layout.should_save_and_restore_shared_window_position()
    }

    fn apply_shared_changes(&self, host: &Host, window: &Window) {
        window.initialize(host);
        if self.should_restore_shared_position(window) {
            window.restore_position(host, false);
        }
    }

    pub fn add_to_shared(&mut self, handle: WindowHandle) {
        self.removed_shared.retain(|&h| h != handle);
        if !self.shared.contains(&handle) {
            self.shared.push(handle);
        }
    }

    /// The window is no longer shared. A visible workspace applies its own
    /// state to the window right away, an invisible one on the next `switch_to`.
    pub fn remove_from_shared(&mut self, host: &Host, handle: WindowHandle) {
        self.shared.retain(|&h| h != handle);
        if self.is_visible {
            if let Some(window) = self.window(handle) {
                self.apply_shared_changes(host, window);
            }
        } else if !self.removed_shared.contains(&handle) {
            self.removed_shared.push(handle);
        }
    }

    pub fn switch_to(&mut self, host: &Host) {
        let removed = std::mem::take(&mut self.removed_shared);
        for window in self
            .windows
            .iter()
            .filter(|w| self.shared.contains(&w.handle) || removed.contains(&w.handle))
        {
            self.apply_shared_changes(host, window);
        }

        if self.needs_reposition() {
            self.reposition(host);
        }

        self.is_visible = true;
        tracing::info!("Workspace {} shown", self.id);
        host.events.emit_workspace_shown(self.id);
    }

    pub fn unswitch(&mut self, host: &Host) {
        let needs_reposition = self.needs_reposition();
        let layout_saves = self.layout.should_save_and_restore_shared_window_position();
        for window in self
            .windows
            .iter_mut()
            .filter(|w| w.is_shared() && (!needs_reposition || w.is_floating || layout_saves))
        {
            window.save_position(host);
        }

        self.is_visible = false;
        tracing::info!("Workspace {} hidden", self.id);
        host.events.emit_workspace_hidden(self.id);
    }

    /// Defers a show for every window. Z-order is restored when floating or
    /// shared windows could have been reordered while hidden.
    pub fn show_windows(&self, host: &Host, batch: &mut PositionBatch) {
        let restore_z_order =
            self.windows.len() > 1 && self.windows.iter().any(|w| w.is_shared() || w.is_floating);
        let mut previous: Option<WindowHandle> = None;

        for window in &self.windows {
            if !host.is_responsive(window.handle) {
                continue;
            }
            let mut flags = PositionFlags::show();
            if restore_z_order {
                flags.z_order = previous.map_or(ZOrder::Top, ZOrder::After);
                previous = Some(window.handle);
            }
            batch.defer(window.handle, None, flags);
        }
    }

    /// Work that has to follow the committed show batch.
    pub fn finish_show(&self, host: &Host) {
        for window in &self.windows {
            window.show_popups_and_redraw(host);
            if window.hide_from_taskbar_when_inactive {
                window.show_in_taskbar(host, true);
            }
        }
    }

    /// Defers a hide for every window not in `keep`. Returns each hidden
    /// window paired with whether it answered the liveness probe; hung windows
    /// are not added to the batch.
    pub fn hide_windows(
        &self,
        host: &Host,
        batch: &mut PositionBatch,
        keep: &[WindowHandle],
    ) -> Vec<(WindowHandle, bool)> {
        let mut hidden = Vec::new();
        for window in self.windows.iter().filter(|w| !keep.contains(&w.handle)) {
            let responsive = host.is_responsive(window.handle);
            if responsive {
                window.hide_popups(host);
                if window.hide_from_taskbar_when_inactive {
                    window.show_in_taskbar(host, false);
                }
                batch.defer(window.handle, None, PositionFlags::hide());
            }
            hidden.push((window.handle, responsive));
        }
        hidden
    }

    pub fn revert_to_initial_values(&mut self, host: &Host) {
        for window in &mut self.windows {
            window.revert_to_initial_values(host);
        }
    }

    /// Runs a layout hook with the managed list. A hidden workspace only
    /// records that it needs a reposition on the next switch.
    fn notify_layout<F>(&mut self, handle: WindowHandle, hook: F)
    where
        F: FnOnce(&dyn Layout, &Window, &[&Window], Area, bool),
    {
        let relayout = self.is_visible;
        let windows = collect_managed(&self.windows, &self.managed);
        if let Some(window) = self.windows.iter().find(|w| w.handle == handle) {
            hook(self.layout.as_ref(), window, &windows, self.area, relayout);
        }
        self.has_changes |= !relayout;
    }

    fn move_to_top(&mut self, handle: WindowHandle) -> bool {
        let Some(index) = self.windows.iter().position(|w| w.handle == handle) else {
            return false;
        };
        let window = self.windows.remove(index);
        self.windows.insert(0, window);
        true
    }

    fn move_to_bottom(&mut self, handle: WindowHandle) -> bool {
        let Some(index) = self.windows.iter().position(|w| w.handle == handle) else {
            return false;
        };
        let window = self.windows.remove(index);
        self.windows.push(window);
        true
    }
}
