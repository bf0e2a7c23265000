use std::collections::HashSet;

use super::{Rect, WindowHandle, Workspace, WorkspaceId};
use crate::layout::Area;
use crate::platform::{DockEdge, Host, MonitorInfo, PositionBatch, PositionFlags, ZOrder};

/// An AppBar reservation hosting a strip of status bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dock {
    pub handle: WindowHandle,
    pub edge: DockEdge,
    pub height: u32,
    /// Rectangle last granted by the OS.
    pub rect: Option<Rect>,
}

/// Bar lists of one workspace, plus the docks they resolve to.
#[derive(Debug, Clone)]
struct WorkspaceBars {
    workspace: WorkspaceId,
    class: usize,
    top_bars: Vec<String>,
    bottom_bars: Vec<String>,
    top: Option<WindowHandle>,
    bottom: Option<WindowHandle>,
}

impl WorkspaceBars {
    fn dock(&self, edge: DockEdge) -> Option<WindowHandle> {
        match edge {
            DockEdge::Top => self.top,
            DockEdge::Bottom => self.bottom,
        }
    }

    fn docks(&self) -> impl Iterator<Item = WindowHandle> {
        self.top.into_iter().chain(self.bottom)
    }
}

pub struct Monitor {
    pub index: usize,
    pub info: MonitorInfo,
    pub visible_workspace: Option<WorkspaceId>,
    workspaces: Vec<WorkspaceBars>,
    docks: Vec<Dock>,
    temporarily_shown: HashSet<WindowHandle>,
    bars_topmost: bool,
}

impl Monitor {
    pub fn new(info: MonitorInfo) -> Self {
        Self {
            index: info.index,
            info,
            visible_workspace: None,
            workspaces: Vec::new(),
            docks: Vec::new(),
            temporarily_shown: HashSet::new(),
            bars_topmost: true,
        }
    }

    pub fn workspaces(&self) -> impl Iterator<Item = WorkspaceId> + '_ {
        self.workspaces.iter().map(|w| w.workspace)
    }

    pub fn docks(&self) -> &[Dock] {
        &self.docks
    }

    pub fn bar_class(&self, workspace: WorkspaceId) -> Option<usize> {
        self.bars(workspace).map(|b| b.class)
    }

    fn bars(&self, workspace: WorkspaceId) -> Option<&WorkspaceBars> {
        self.workspaces.iter().find(|b| b.workspace == workspace)
    }

    fn dock_height(&self, dock: Option<WindowHandle>) -> u32 {
        dock.and_then(|h| self.docks.iter().find(|d| d.handle == h))
            .map_or(0, |d| d.height)
    }

    /// Screen region left to `workspace` once its docks are reserved.
    pub fn area_for(&self, workspace: WorkspaceId) -> Area {
        let mut working_area = self.info.working_area;
        if let Some(bars) = self.bars(workspace) {
            let top = self.dock_height(bars.top);
            let bottom = self.dock_height(bars.bottom);
            working_area.y += top as i32;
            working_area.height = working_area.height.saturating_sub(top + bottom);
        }
        Area {
            monitor: self.index,
            bounds: self.info.bounds,
            working_area,
        }
    }

    /// Registers a workspace and resolves its bar-equivalence class and docks.
    /// `bar_height` maps a bar name to the height it reserves.
    pub fn add_workspace<F>(&mut self, host: &Host, workspace: &Workspace, bar_height: F)
    where
        F: Fn(&str) -> u32,
    {
        if self.bars(workspace.id).is_some() {
            return;
        }

        let existing = self
            .workspaces
            .iter()
            .find(|b| b.top_bars == workspace.top_bars && b.bottom_bars == workspace.bottom_bars);
        let (class, top, bottom) = match existing {
            Some(b) => (b.class, b.top, b.bottom),
            None => {
                let class = self
                    .workspaces
                    .iter()
                    .map(|b| b.class + 1)
                    .max()
                    .unwrap_or(0);
                let top_height = workspace.top_bars.iter().map(|b| bar_height(b)).sum();
                let bottom_height = workspace.bottom_bars.iter().map(|b| bar_height(b)).sum();
                (
                    class,
                    self.dock_for(host, DockEdge::Top, top_height),
                    self.dock_for(host, DockEdge::Bottom, bottom_height),
                )
            }
        };

        tracing::debug!(
            "Workspace {} on monitor {} uses bar class {}",
            workspace.id,
            self.index,
            class
        );
        self.workspaces.push(WorkspaceBars {
            workspace: workspace.id,
            class,
            top_bars: workspace.top_bars.clone(),
            bottom_bars: workspace.bottom_bars.clone(),
            top,
            bottom,
        });
    }

    /// An existing dock with the same edge and height, or a new one.
    /// Height 0 means no dock.
    fn dock_for(&mut self, host: &Host, edge: DockEdge, height: u32) -> Option<WindowHandle> {
        if height == 0 {
            return None;
        }
        if let Some(dock) = self
            .docks
            .iter()
            .find(|d| d.edge == edge && d.height == height)
        {
            return Some(dock.handle);
        }

        let handle = host.manipulator.create_dock(self.index, edge, height)?;
        self.docks.push(Dock {
            handle,
            edge,
            height,
            rect: None,
        });
        Some(handle)
    }

    /// Forgets a workspace and destroys the docks nothing else uses.
    pub fn remove_workspace(&mut self, host: &Host, workspace: WorkspaceId) {
        let Some(pos) = self.workspaces.iter().position(|b| b.workspace == workspace) else {
            return;
        };
        let removed = self.workspaces.remove(pos);
        if self.visible_workspace == Some(workspace) {
            self.visible_workspace = None;
        }

        for handle in removed.docks() {
            let in_use = self
                .workspaces
                .iter()
                .any(|b| b.docks().any(|h| h == handle));
            if !in_use {
                host.manipulator.destroy_dock(handle);
                self.docks.retain(|d| d.handle != handle);
            }
        }
    }

    /// Makes `workspace` visible at startup, reserving and showing its docks.
    pub fn set_starting_workspace(&mut self, host: &Host, workspace: WorkspaceId) {
        self.visible_workspace = Some(workspace);
        self.show_hide_docks(host, None, workspace);
    }

    /// Hides the old workspace and shows `workspace`. The caller shows and
    /// hides the workspaces' windows afterwards. Returns false when
    /// `workspace` already is the visible one.
    pub fn switch_to_workspace(
        &mut self,
        host: &Host,
        workspaces: &mut [Workspace],
        workspace: WorkspaceId,
    ) -> bool {
        let old = self.visible_workspace;
        if old == Some(workspace) {
            return false;
        }

        if let Some(old_ws) = old.and_then(|id| workspaces.get_mut(id.wrapping_sub(1))) {
            old_ws.unswitch(host);
        }
        let old_class = old.and_then(|id| self.bar_class(id));
        if old_class != self.bar_class(workspace) {
            self.show_hide_docks(host, old, workspace);
        }

        self.visible_workspace = Some(workspace);
        let area = self.area_for(workspace);
        if let Some(new_ws) = workspaces.get_mut(workspace.wrapping_sub(1)) {
            new_ws.set_area(area);
            new_ws.switch_to(host);
        }
        tracing::info!(
            "Monitor {}: workspace {:?} -> {}",
            self.index,
            old,
            workspace
        );
        true
    }

    /// Swaps the dock reservations of `old` for those of `new`. New docks are
    /// positioned and shown in one batch before the old ones are hidden.
    fn show_hide_docks(&mut self, host: &Host, old: Option<WorkspaceId>, new: WorkspaceId) {
        let old_bars = old.and_then(|id| self.bars(id)).cloned();
        let Some(new_bars) = self.bars(new).cloned() else {
            return;
        };

        let mut shown = Vec::new();
        for edge in [DockEdge::Top, DockEdge::Bottom] {
            let hide = old_bars.as_ref().and_then(|b| b.dock(edge));
            let show = new_bars.dock(edge);
            if let Some(hide) = hide.filter(|&h| Some(h) != show) {
                host.manipulator.release_dock(hide);
            }
            if let Some(show) = show.filter(|&h| Some(h) != hide) {
                shown.push(self.reserve(host, show));
            }
        }

        if !shown.is_empty() {
            let mut batch = PositionBatch::begin(shown.len());
            let flags = PositionFlags {
                show: true,
                z_order: self.bars_z_order(),
                ..Default::default()
            };
            for (handle, rect) in shown {
                batch.defer(handle, Some(rect), flags);
            }
            host.manipulator.commit(&batch);
        }

        if let Some(old_bars) = old_bars {
            let stale: Vec<WindowHandle> = old_bars
                .docks()
                .filter(|h| !new_bars.docks().any(|n| n == *h))
                .collect();
            if !stale.is_empty() {
                let mut batch = PositionBatch::begin(stale.len());
                for handle in stale {
                    batch.defer(handle, None, PositionFlags::hide());
                }
                host.manipulator.commit(&batch);
            }
        }
    }

    fn reserve(&mut self, host: &Host, handle: WindowHandle) -> (WindowHandle, Rect) {
        let info = self.info.clone();
        let dock = self.docks.iter_mut().find(|d| d.handle == handle);
        match dock {
            Some(dock) => {
                let rect = host
                    .manipulator
                    .set_dock_position(handle, &info, dock.edge, dock.height);
                dock.rect = Some(rect);
                (handle, rect)
            }
            None => (handle, info.bounds),
        }
    }

    fn bars_z_order(&self) -> ZOrder {
        if self.bars_topmost {
            ZOrder::Topmost
        } else {
            ZOrder::Bottom
        }
    }

    fn visible_docks(&self) -> Vec<WindowHandle> {
        self.visible_workspace
            .and_then(|id| self.bars(id))
            .map(|b| b.docks().collect())
            .unwrap_or_default()
    }

    fn restack_docks(&self, host: &Host) {
        let docks = self.visible_docks();
        if docks.is_empty() {
            return;
        }
        let mut batch = PositionBatch::begin(docks.len());
        for handle in docks {
            batch.defer(handle, None, PositionFlags::z_order(self.bars_z_order()));
        }
        host.manipulator.commit(&batch);
    }

    /// A full-screen application took over the monitor. The desktop itself
    /// reports as full screen when it is activated, so it is ignored.
    pub fn full_screen_app_opened(&mut self, host: &Host, foreground: Option<WindowHandle>) {
        if !self.bars_topmost {
            return;
        }
        let desktop = foreground
            .and_then(|h| host.system.window(h))
            .is_some_and(|w| w.class_name == "WorkerW" || w.process_name.eq_ignore_ascii_case("explorer"));
        if desktop {
            return;
        }
        self.bars_topmost = false;
        self.restack_docks(host);
    }

    pub fn full_screen_app_closed(&mut self, host: &Host) {
        if self.bars_topmost {
            return;
        }
        self.bars_topmost = true;
        self.restack_docks(host);
    }

    /// Re-requests the reservation of `dock`. Returns true when the OS
    /// granted a different rectangle and the bars were moved.
    pub fn dock_position_changed(&mut self, host: &Host, dock: WindowHandle) -> bool {
        if !self.visible_docks().contains(&dock) {
            return false;
        }
        let previous = self
            .docks
            .iter()
            .find(|d| d.handle == dock)
            .and_then(|d| d.rect);
        let (handle, rect) = self.reserve(host, dock);
        if previous == Some(rect) {
            return false;
        }

        let mut batch = PositionBatch::begin(1);
        batch.defer(
            handle,
            Some(rect),
            PositionFlags {
                z_order: self.bars_z_order(),
                ..PositionFlags::reposition()
            },
        );
        host.manipulator.commit(&batch);
        true
    }

    /// Monitor geometry changed. Returns true when bounds or working area moved.
    pub fn refresh_info(&mut self, info: MonitorInfo) -> bool {
        let changed = self.info.bounds != info.bounds || self.info.working_area != info.working_area;
        self.info = info;
        changed
    }

    pub fn add_temporarily_shown(&mut self, handle: WindowHandle) {
        self.temporarily_shown.insert(handle);
    }

    pub fn remove_temporarily_shown(&mut self, handle: WindowHandle) -> bool {
        self.temporarily_shown.remove(&handle)
    }

    pub fn is_temporarily_shown(&self, handle: WindowHandle) -> bool {
        self.temporarily_shown.contains(&handle)
    }

    /// Empties the set of windows borrowed from other workspaces.
    pub fn take_temporarily_shown(&mut self) -> Vec<WindowHandle> {
        self.temporarily_shown.drain().collect()
    }

    /// Releases and destroys every dock.
    pub fn dispose(&mut self, host: &Host) {
        for dock in self.docks.drain(..) {
            host.manipulator.release_dock(dock.handle);
            host.manipulator.destroy_dock(dock.handle);
        }
        self.workspaces.clear();
        self.visible_workspace = None;
    }
}
