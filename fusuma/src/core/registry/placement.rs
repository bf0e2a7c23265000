use super::super::{WindowHandle, WorkspaceId};
use super::switch::{hide_window, show_window, switch_to_workspace};
use super::Registry;
use crate::platform::Host;

/// Moves the instance of `handle` from one workspace to another.
pub fn move_window(
    registry: &mut Registry,
    host: &Host,
    handle: WindowHandle,
    from: WorkspaceId,
    to: WorkspaceId,
    follow: bool,
) -> bool {
    let handle = registry.resolve_owner(handle);
    if from == to || registry.workspace(to).is_none() {
        return false;
    }
    let ids = registry.workspaces_of(handle);
    if !ids.contains(&from) || ids.contains(&to) {
        return false;
    }

    let was_visible = registry.is_on_visible_workspace(handle);
    let is_current = from == registry.current;
    let Some(window) = registry
        .workspace_mut(from)
        .and_then(|ws| ws.window_destroyed(host, handle, is_current))
    else {
        return false;
    };
    if let Some(ws) = registry.workspace_mut(to) {
        ws.window_created(host, window);
    }
    if let Some(ids) = registry.applications.get_mut(&handle) {
        for id in ids.iter_mut().filter(|id| **id == from) {
            *id = to;
        }
    }
    tracing::info!("Moved window {} from workspace {} to {}", handle, from, to);

    let now_visible = registry.is_on_visible_workspace(handle);
    if was_visible && !now_visible && !follow {
        hide_window(registry, host, handle);
    } else if !was_visible && now_visible {
        show_window(registry, host, handle);
    }

    if follow {
        switch_to_workspace(registry, host, to, false);
        host.force_foreground(handle);
    }
    true
}

/// Adds a further instance of `handle`, copied from its instance on `from`.
pub fn add_window_to_workspace(
    registry: &mut Registry,
    host: &Host,
    handle: WindowHandle,
    to: WorkspaceId,
    from: WorkspaceId,
) -> bool {
    let handle = registry.resolve_owner(handle);
    if registry.workspace(to).is_none() {
        return false;
    }
    let ids = registry.workspaces_of(handle).to_vec();
    if !ids.contains(&from) || ids.contains(&to) {
        return false;
    }
    let Some(mut window) = registry
        .workspace(from)
        .and_then(|ws| ws.window(handle))
        .cloned()
    else {
        return false;
    };

    let was_visible = registry.is_on_visible_workspace(handle);
    let count = ids.len() + 1;
    for &id in &ids {
        if let Some(ws) = registry.workspace_mut(id) {
            if let Some(instance) = ws.window_mut(handle) {
                instance.workspaces_count = count;
            }
            ws.add_to_shared(handle);
        }
    }
    window.workspaces_count = count;
    if let Some(ws) = registry.workspace_mut(to) {
        ws.window_created(host, window);
    }
    if let Some(ids) = registry.applications.get_mut(&handle) {
        ids.push(to);
    }
    tracing::info!(
        "Added window {} to workspace {}, now on {} workspaces",
        handle,
        to,
        count
    );

    if !was_visible && registry.is_on_visible_workspace(handle) {
        show_window(registry, host, handle);
    }
    true
}

/// Drops the instance of `handle` on `workspace`. The last instance cannot
/// be removed this way.
pub fn remove_window_from_workspace(
    registry: &mut Registry,
    host: &Host,
    handle: WindowHandle,
    workspace: WorkspaceId,
) -> bool {
    let handle = registry.resolve_owner(handle);
    let ids = registry.workspaces_of(handle).to_vec();
    if !ids.contains(&workspace) || ids.len() < 2 {
        return false;
    }

    let was_visible = registry.is_on_visible_workspace(handle);
    let is_current = workspace == registry.current;
    if let Some(ws) = registry.workspace_mut(workspace) {
        ws.window_destroyed(host, handle, is_current);
    }
    let remaining: Vec<WorkspaceId> = ids.into_iter().filter(|&id| id != workspace).collect();
    let count = remaining.len();
    for &id in &remaining {
        if let Some(ws) = registry.workspace_mut(id) {
            if let Some(instance) = ws.window_mut(handle) {
                instance.workspaces_count = count;
            }
            if count == 1 {
                ws.remove_from_shared(host, handle);
            }
        }
    }
    registry.applications.insert(handle, remaining);
    tracing::info!("Removed window {} from workspace {}", handle, workspace);

    if was_visible && !registry.is_on_visible_workspace(handle) {
        hide_window(registry, host, handle);
    }
    true
}

/// Forgets `handle` everywhere, typically because it was destroyed.
pub fn remove_window_from_all_workspaces(
    registry: &mut Registry,
    host: &Host,
    handle: WindowHandle,
) -> bool {
    let handle = registry.resolve_owner(handle);
    let Some(ids) = registry.applications.remove(&handle) else {
        return false;
    };
    let current = registry.current;
    for id in ids {
        if let Some(ws) = registry.workspace_mut(id) {
            ws.window_destroyed(host, handle, id == current);
        }
    }
    registry.owners.retain(|_, owner| *owner != handle);
    registry.hidden.remove(&handle);
    for monitor in &mut registry.monitors {
        monitor.remove_temporarily_shown(handle);
    }
    tracing::info!("Window {} is no longer managed", handle);
    true
}
