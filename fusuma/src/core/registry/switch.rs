use super::super::{WindowHandle, WorkspaceId};
use super::Registry;
use crate::platform::{Host, PositionBatch, ShowCommand};

pub fn switch_to_workspace(
    registry: &mut Registry,
    host: &Host,
    id: WorkspaceId,
    set_foreground: bool,
) -> bool {
    if id == registry.current {
        return false;
    }
    let Some(target) = registry.workspace(id) else {
        tracing::warn!("Cannot switch to missing workspace {}", id);
        return false;
    };

    let monitor = target.monitor;
    if !target.is_visible {
        let old = registry.monitors[monitor].visible_workspace;
        if !registry.monitors[monitor].switch_to_workspace(host, &mut registry.workspaces, id) {
            return false;
        }
        show_hide_windows(registry, host, monitor, old, id);
    }

    let previous = registry.current;
    if let Some(ws) = registry.workspace_mut(previous) {
        ws.set_current(host, false);
    }
    if let Some(ws) = registry.workspace_mut(id) {
        ws.set_current(host, true);
    }
    registry.previous = previous;
    registry.current = id;
    tracing::info!("Switched workspace {} -> {}", previous, id);

    if set_foreground {
        set_workspace_foreground(registry, host, id);
    }
    true
}

/// Shows the windows of `new` and then hides those of `old` that `new`
/// does not hold, each side as one batch.
fn show_hide_windows(
    registry: &mut Registry,
    host: &Host,
    monitor: usize,
    old: Option<WorkspaceId>,
    new: WorkspaceId,
) {
    let Some(new_ws) = registry.workspace(new) else {
        return;
    };
    let keep: Vec<WindowHandle> = new_ws.windows().iter().map(|w| w.handle).collect();

    let mut show = PositionBatch::begin(keep.len());
    new_ws.show_windows(host, &mut show);
    host.manipulator.commit(&show);
    new_ws.finish_show(host);

    let mut hidden: Vec<WindowHandle> = Vec::new();
    if let Some(old_ws) = old.and_then(|id| registry.workspace(id)) {
        let mut hide = PositionBatch::begin(old_ws.windows().len());
        for (handle, responsive) in old_ws.hide_windows(host, &mut hide, &keep) {
            if responsive {
                if let Some(window) = old_ws.window(handle) {
                    hidden.extend_from_slice(window.owned_windows());
                }
            }
        }
        host.manipulator.commit(&hide);
    }

    for handle in registry.monitors[monitor].take_temporarily_shown() {
        if keep.contains(&handle) || !host.is_responsive(handle) {
            continue;
        }
        match registry.window(handle) {
            Some(window) => {
                window.hide(host);
                hidden.extend_from_slice(window.owned_windows());
            }
            None => {
                host.manipulator.show_window(handle, ShowCommand::Hide);
                hidden.push(handle);
            }
        }
    }

    for handle in hidden {
        registry.mark_hidden(handle);
    }
}

/// Hides a managed window and its owned windows, recording the self-hide.
pub fn hide_window(registry: &mut Registry, host: &Host, handle: WindowHandle) {
    if !host.is_responsive(handle) {
        return;
    }
    let owned: Vec<WindowHandle> = match registry.window(handle) {
        Some(window) => {
            window.hide(host);
            window.owned_windows().to_vec()
        }
        None => {
            host.manipulator.show_window(handle, ShowCommand::Hide);
            vec![handle]
        }
    };
    for h in owned {
        registry.mark_hidden(h);
    }
}

/// Shows a managed window that none of the visible workspaces displays.
pub fn show_window(registry: &Registry, host: &Host, handle: WindowHandle) {
    if !host.is_responsive(handle) {
        return;
    }
    if let Some(window) = registry.window(handle) {
        window.show(host);
    }
}

pub fn set_workspace_foreground(registry: &Registry, host: &Host, id: WorkspaceId) {
    if let Some(ws) = registry.workspace(id) {
        ws.set_foreground(host);
    }
}

/// Switches to a workspace holding `handle`, the current one if it does,
/// then brings the window to the foreground.
pub fn switch_to_application(registry: &mut Registry, host: &Host, handle: WindowHandle) -> bool {
    let handle = registry.resolve_owner(handle);
    let ids = registry.workspaces_of(handle).to_vec();
    if ids.is_empty() {
        return false;
    }

    if !ids.contains(&registry.current) {
        let target = ids
            .iter()
            .copied()
            .find(|&id| registry.workspace(id).is_some_and(|ws| ws.is_visible))
            .unwrap_or(ids[0]);
        switch_to_workspace(registry, host, target, false);
    }

    if host.system.is_iconic(handle) {
        host.manipulator.show_window(handle, ShowCommand::Restore);
    }
    host.force_foreground(handle);
    true
}
