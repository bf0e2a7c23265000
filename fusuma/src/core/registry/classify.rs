use super::super::{
    resolve_targets, OnWindowCreatedOnCurrentWorkspaceAction, OnWindowShownAction, ProgramRule,
    Window, WindowHandle, WorkspaceId,
};
use super::switch::{hide_window, set_workspace_foreground};
use super::{PostedAction, Registry};
use crate::platform::{Host, NativeWindow, ShowCommand};

pub fn start(registry: &mut Registry, host: &Host) {
    for monitor in 0..registry.monitors.len() {
        let ids: Vec<WorkspaceId> = registry
            .workspaces
            .iter()
            .filter(|ws| ws.monitor == monitor)
            .map(|ws| ws.id)
            .collect();
        let Some(&first) = ids.first() else {
            tracing::warn!("Monitor {} has no workspaces", monitor);
            continue;
        };

        let bar_heights = registry.bar_heights.clone();
        for &id in &ids {
            let ws = &registry.workspaces[id - 1];
            registry.monitors[monitor].add_workspace(host, ws, |name| {
                bar_heights.get(name).copied().unwrap_or(0)
            });
        }

        let starting = registry
            .starting_workspaces
            .get(monitor)
            .copied()
            .filter(|id| ids.contains(id))
            .unwrap_or(first);
        registry.monitors[monitor].set_starting_workspace(host, starting);
        for &id in &ids {
            let ws = &mut registry.workspaces[id - 1];
            ws.set_area(registry.monitors[monitor].area_for(id));
            ws.is_visible = id == starting;
        }
        if monitor == 0 {
            registry.current = starting;
            registry.previous = starting;
        }
    }

    let current = registry.current;
    if let Some(ws) = registry.workspace_mut(current) {
        ws.set_current(host, true);
    }

    for handle in host.system.top_level_windows() {
        classify_and_route(registry, host, handle);
    }
    for ws in &mut registry.workspaces {
        ws.initialize();
    }

    // Windows only held by invisible workspaces start out hidden.
    let to_hide: Vec<WindowHandle> = registry
        .applications
        .keys()
        .copied()
        .filter(|&h| !registry.is_on_visible_workspace(h))
        .collect();
    for handle in to_hide {
        hide_window(registry, host, handle);
    }

    for ws in registry.workspaces.iter_mut().filter(|ws| ws.is_visible) {
        ws.switch_to(host);
    }

    registry.finished_initializing = true;
    if let Some(ws) = registry.workspace(current) {
        ws.set_foreground(host);
    }
    tracing::info!(
        "Started with {} windows on {} workspaces, current workspace {}",
        registry.applications.len(),
        registry.workspaces.len(),
        current
    );
}

/// Classifies a native window and, when a rule manages it, inserts one
/// instance per target workspace. Returns whether the window is now managed.
pub fn classify_and_route(registry: &mut Registry, host: &Host, handle: WindowHandle) -> bool {
    if registry.is_known(handle) || registry.ignored.contains(&handle) {
        return false;
    }
    let Some(info) = host.system.window(handle) else {
        return false;
    };
    if !info.is_app_window() {
        return false;
    }
    add_window(registry, host, info, true)
}

fn ignore(registry: &mut Registry, info: &NativeWindow, reason: &str) -> bool {
    tracing::debug!(
        "Ignoring window {} ({}, '{}'): {}",
        info.handle,
        info.class_name,
        info.title,
        reason
    );
    registry.ignored.insert(info.handle);
    false
}

fn add_window(registry: &mut Registry, host: &Host, info: NativeWindow, first_try: bool) -> bool {
    let handle = info.handle;
    let Some(rule) = registry.rules_engine.find_match(&info).cloned() else {
        return ignore(registry, &info, "no matching rule");
    };
    if !rule.is_managed || rule.rules.is_empty() {
        return ignore(registry, &info, "unmanaged");
    }

    if let Some(delay) = rule.try_again_after {
        if first_try && registry.finished_initializing {
            host.settle(delay);
            return match host.system.window(handle) {
                Some(info) if info.is_app_window() => add_window(registry, host, info, false),
                _ => false,
            };
        }
    }

    let current = registry.current;
    let targets: Vec<_> = resolve_targets(&rule.rules, current)
        .into_iter()
        .filter(|r| registry.workspace(r.workspace).is_some())
        .collect();
    if targets.is_empty() {
        return ignore(registry, &info, "rule targets no existing workspace");
    }

    let mut owned = Vec::new();
    if rule.handle_owned_windows {
        owned = host
            .system
            .owned_windows(handle)
            .into_iter()
            .filter(|&h| {
                host.system
                    .window(h)
                    .is_some_and(|w| (rule.owned_window_matcher)(&w))
            })
            .collect();
        if owned.is_empty() {
            if first_try && registry.finished_initializing {
                host.settle(host.timing.owned_windows_retry());
                return match host.system.window(handle) {
                    Some(info) => add_window(registry, host, info, false),
                    None => false,
                };
            }
            return ignore(registry, &info, "no owned windows");
        }
    }

    let ids: Vec<WorkspaceId> = targets.iter().map(|r| r.workspace).collect();
    if registry.finished_initializing {
        if ids.contains(&current) {
            on_created_on_current_workspace(registry, host, handle, &rule);
        } else {
            on_created_elsewhere(registry, host, handle, &rule, &ids);
        }

        if rule.wait_for_input_idle {
            if !host
                .system
                .wait_for_input_idle(handle, host.timing.input_idle_timeout())
            {
                tracing::debug!("Window {} did not become input idle", handle);
            }
        } else if let Some(delay) = rule.window_created_delay {
            host.settle(delay);
        }
    }

    if rule.redraw_desktop_on_window_created {
        host.manipulator.redraw_desktop();
    }

    let is_minimized = host.system.is_iconic(handle);
    let placement = host.system.window_placement(handle);
    for target in &targets {
        let mut window = Window::new(&info, target, &rule, ids.len(), is_minimized, placement);
        for &h in &owned {
            window.add_owned_window(h);
        }
        if let Some(ws) = registry.workspace_mut(target.workspace) {
            ws.window_created(host, window);
        }
    }
    for &h in &owned {
        registry.owners.insert(h, handle);
    }
    registry.applications.insert(handle, ids.clone());

    tracing::info!(
        "Managing window {} ({}, '{}') on workspaces {:?}",
        handle,
        info.class_name,
        info.title,
        ids
    );
    true
}

fn on_created_on_current_workspace(
    registry: &mut Registry,
    host: &Host,
    handle: WindowHandle,
    rule: &ProgramRule,
) {
    match rule.on_window_created_on_current_workspace {
        OnWindowCreatedOnCurrentWorkspaceAction::ActivateWindow => {
            if host.system.is_iconic(handle) {
                host.manipulator.show_window(handle, ShowCommand::Restore);
                host.settle(host.timing.minimize_restore_delay());
            }
            registry.post(PostedAction::Foreground(handle));
        }
        OnWindowCreatedOnCurrentWorkspaceAction::MoveToBottom => {
            host.settle(host.timing.hide_window_delay());
            let current = registry.current;
            set_workspace_foreground(registry, host, current);
        }
    }
}

fn on_created_elsewhere(
    registry: &mut Registry,
    host: &Host,
    handle: WindowHandle,
    rule: &ProgramRule,
    ids: &[WorkspaceId],
) {
    let current = registry.current;
    match rule.on_window_created {
        OnWindowShownAction::SwitchToWindowsWorkspace => {
            registry.post(PostedAction::SwitchToApplication(handle));
        }
        OnWindowShownAction::MoveWindowToCurrentWorkspace => {
            registry.post(PostedAction::MoveWindow {
                handle,
                from: ids[0],
                to: current,
            });
        }
        OnWindowShownAction::TemporarilyShowWindowOnCurrentWorkspace => {
            if let Some(monitor) = registry.monitor_of(current) {
                registry.monitors[monitor].add_temporarily_shown(handle);
            }
            on_created_on_current_workspace(registry, host, handle, rule);
        }
        OnWindowShownAction::HideWindow => {
            host.settle(host.timing.hide_window_delay());
            set_workspace_foreground(registry, host, current);
            let visible = ids
                .iter()
                .any(|&id| registry.workspace(id).is_some_and(|ws| ws.is_visible));
            if !visible {
                registry.mark_hidden(handle);
                host.manipulator.show_window(handle, ShowCommand::Hide);
            }
        }
    }
}

/// Picks up visible windows that were missed and drops handles that no
/// longer exist.
pub fn refresh(registry: &mut Registry, host: &Host) {
    for handle in host.system.top_level_windows() {
        if !registry.is_known(handle) && !registry.ignored.contains(&handle) {
            classify_and_route(registry, host, handle);
        }
    }

    let gone: Vec<WindowHandle> = registry
        .applications
        .keys()
        .copied()
        .filter(|&h| !host.system.is_window(h))
        .collect();
    for handle in gone {
        tracing::info!("Window {} disappeared, removing", handle);
        super::placement::remove_window_from_all_workspaces(registry, host, handle);
    }

    registry.ignored.retain(|&h| host.system.is_window(h));
    registry.owners.retain(|&h, _| host.system.is_window(h));
    for ws in &mut registry.workspaces {
        let handles: Vec<WindowHandle> = ws.windows().iter().map(|w| w.handle).collect();
        for h in handles {
            if let Some(window) = ws.window_mut(h) {
                window.prune_owned_windows(host);
            }
        }
    }
}
