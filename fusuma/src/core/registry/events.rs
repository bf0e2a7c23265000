use super::super::{OnWindowShownAction, WindowHandle};
use super::classify::{classify_and_route, refresh};
use super::placement::{move_window, remove_window_from_all_workspaces};
use super::switch::{
    hide_window, set_workspace_foreground, switch_to_application, switch_to_workspace,
};
use super::{PostedAction, Registry};
use crate::event::NativeEvent;
use crate::platform::Host;

pub fn handle_event(registry: &mut Registry, host: &Host, event: NativeEvent) {
    tracing::trace!("Native event: {:?}", event);
    match event {
        NativeEvent::WindowCreated(handle) => {
            classify_and_route(registry, host, handle);
        }
        NativeEvent::WindowDestroyed(handle) => window_destroyed(registry, host, handle),
        NativeEvent::WindowShown(handle) => window_shown(registry, host, handle),
        NativeEvent::WindowHidden(handle) => window_hidden(registry, host, handle),
        NativeEvent::MinimizeStart(handle) => {
            let handle = registry.resolve_owner(handle);
            for id in registry.workspaces_of(handle).to_vec() {
                if let Some(ws) = registry.workspace_mut(id) {
                    ws.window_minimized(host, handle);
                }
            }
        }
        NativeEvent::MinimizeEnd(handle) => {
            let handle = registry.resolve_owner(handle);
            for id in registry.workspaces_of(handle).to_vec() {
                if let Some(ws) = registry.workspace_mut(id) {
                    ws.window_restored(host, handle);
                }
            }
        }
        NativeEvent::WindowActivated(handle) => window_activated(registry, host, handle),
        NativeEvent::WindowFlashing(handle) => {
            let handle = registry.resolve_owner(handle);
            if registry.is_known(handle) {
                host.events.emit_window_flashing(handle);
            }
        }
        NativeEvent::TitleChanged(handle) => title_changed(registry, host, handle),
        NativeEvent::IconChanged(handle) => {
            tracing::trace!("Icon of window {} changed", handle);
        }
        NativeEvent::DockPositionChanged(dock) => {
            for i in 0..registry.monitors.len() {
                if registry.monitors[i].dock_position_changed(host, dock) {
                    relayout_monitor(registry, host, i);
                }
            }
        }
        NativeEvent::FullScreenOpened { monitor } => {
            let foreground = host.system.foreground_window();
            if let Some(m) = registry.monitors.get_mut(monitor) {
                m.full_screen_app_opened(host, foreground);
            }
        }
        NativeEvent::FullScreenClosed { monitor } => {
            if let Some(m) = registry.monitors.get_mut(monitor) {
                m.full_screen_app_closed(host);
            }
        }
        NativeEvent::DisplaySettingsChanged => display_settings_changed(registry, host),
        NativeEvent::WindowReplaced { old, new } => {
            tracing::debug!("Window {} replaced by {}", old, new);
            remove_window_from_all_workspaces(registry, host, old);
            classify_and_route(registry, host, new);
        }
    }
}

fn window_destroyed(registry: &mut Registry, host: &Host, handle: WindowHandle) {
    registry.ignored.remove(&handle);
    registry.hidden.remove(&handle);
    if let Some(owner) = registry.owners.remove(&handle) {
        for id in registry.workspaces_of(owner).to_vec() {
            if let Some(window) = registry
                .workspace_mut(id)
                .and_then(|ws| ws.window_mut(owner))
            {
                window.prune_owned_windows(host);
            }
        }
        return;
    }
    remove_window_from_all_workspaces(registry, host, handle);
}

fn window_shown(registry: &mut Registry, host: &Host, handle: WindowHandle) {
    let owner = registry.resolve_owner(handle);
    if !registry.is_known(owner) {
        classify_and_route(registry, host, handle);
        return;
    }
    if registry.is_on_visible_workspace(owner) {
        return;
    }
    hidden_window_shown(registry, host, owner);
}

/// A window whose workspaces are all hidden showed itself.
fn hidden_window_shown(registry: &mut Registry, host: &Host, handle: WindowHandle) {
    let Some(window) = registry.window(handle) else {
        return;
    };
    let action = window.on_hidden_window_shown;
    let Some(&from) = registry.workspaces_of(handle).first() else {
        return;
    };
    let current = registry.current;
    tracing::debug!("Hidden window {} was shown, action {:?}", handle, action);

    match action {
        OnWindowShownAction::SwitchToWindowsWorkspace => {
            switch_to_application(registry, host, handle);
        }
        OnWindowShownAction::MoveWindowToCurrentWorkspace => {
            move_window(registry, host, handle, from, current, false);
            host.force_foreground(handle);
        }
        OnWindowShownAction::TemporarilyShowWindowOnCurrentWorkspace => {
            if let Some(monitor) = registry.monitor_of(current) {
                registry.monitors[monitor].add_temporarily_shown(handle);
            }
        }
        OnWindowShownAction::HideWindow => {
            host.settle(host.timing.hidden_window_shown_delay());
            hide_window(registry, host, handle);
            set_workspace_foreground(registry, host, current);
        }
    }
}

/// Redelivered notifications for our own hides are consumed by the hidden
/// multiset. A window on a visible workspace that hid itself is dropped.
fn window_hidden(registry: &mut Registry, host: &Host, handle: WindowHandle) {
    if registry.consume_hidden(handle) {
        return;
    }
    let owner = registry.resolve_owner(handle);
    if owner != handle || !registry.is_known(owner) {
        return;
    }
    let temporarily_shown = registry
        .monitors
        .iter()
        .any(|m| m.is_temporarily_shown(handle));
    if (registry.is_on_visible_workspace(handle) || temporarily_shown)
        && !host.system.is_visible(handle)
    {
        tracing::debug!("Window {} hid itself", handle);
        remove_window_from_all_workspaces(registry, host, handle);
    }
}

fn window_activated(registry: &mut Registry, host: &Host, handle: Option<WindowHandle>) {
    let current = registry.current;
    let Some(handle) = handle.map(|h| registry.resolve_owner(h)) else {
        if let Some(ws) = registry.workspace_mut(current) {
            ws.window_activated(host, None);
        }
        return;
    };

    if !registry.is_known(handle) && !classify_and_route(registry, host, handle) {
        return;
    }

    let ids = registry.workspaces_of(handle).to_vec();
    let target = if ids.contains(&current) {
        Some(current)
    } else {
        ids.iter()
            .copied()
            .find(|&id| registry.workspace(id).is_some_and(|ws| ws.is_visible))
    };

    match target {
        Some(id) => {
            if id != current {
                switch_to_workspace(registry, host, id, false);
            }
            if let Some(ws) = registry.workspace_mut(id) {
                ws.window_activated(host, Some(handle));
            }
        }
        None => hidden_window_shown(registry, host, handle),
    }
}

fn title_changed(registry: &mut Registry, host: &Host, handle: WindowHandle) {
    let handle = registry.resolve_owner(handle);
    let Some(title) = host.system.window(handle).map(|w| w.title) else {
        return;
    };
    let ids = registry.workspaces_of(handle).to_vec();
    if ids.is_empty() {
        return;
    }
    for id in ids {
        if let Some(window) = registry
            .workspace_mut(id)
            .and_then(|ws| ws.window_mut(handle))
        {
            window.display_name = title.clone();
        }
    }
    host.events.emit_window_title_changed(handle, &title);
}

fn relayout_monitor(registry: &mut Registry, host: &Host, monitor: usize) {
    let ids: Vec<_> = registry.monitors[monitor].workspaces().collect();
    for id in ids {
        let area = registry.monitors[monitor].area_for(id);
        if let Some(ws) = registry.workspace_mut(id) {
            ws.set_area(area);
            if ws.is_visible && ws.has_changes {
                ws.reposition(host);
            }
        }
    }
}

fn display_settings_changed(registry: &mut Registry, host: &Host) {
    let infos = host.system.monitors();
    for i in 0..registry.monitors.len() {
        let Some(info) = infos.iter().find(|m| m.index == registry.monitors[i].index) else {
            tracing::warn!("Monitor {} disappeared", registry.monitors[i].index);
            continue;
        };
        if registry.monitors[i].refresh_info(info.clone()) {
            tracing::info!("Monitor {} geometry changed", info.index);
            relayout_monitor(registry, host, i);
        }
    }
    refresh(registry, host);
}

/// Drains work queued during event handling. Each action re-checks that
/// its window still exists.
pub fn run_posted_actions(registry: &mut Registry, host: &Host) {
    while let Some(action) = registry.posted.pop_front() {
        match action {
            PostedAction::SwitchToApplication(handle) => {
                if host.system.is_window(handle) {
                    switch_to_application(registry, host, handle);
                }
            }
            PostedAction::MoveWindow { handle, from, to } => {
                if host.system.is_window(handle) {
                    move_window(registry, host, handle, from, to, false);
                    host.force_foreground(handle);
                }
            }
            PostedAction::Foreground(handle) => {
                if host.system.is_window(handle) {
                    host.force_foreground(handle);
                }
            }
        }
    }
}
