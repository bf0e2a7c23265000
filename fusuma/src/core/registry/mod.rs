use std::collections::{HashMap, HashSet, VecDeque};

use fusuma_ipc::{ShiftDirection, StateEvent, StateInfo, WindowInfo, WorkspaceInfo};

use super::{Config, Monitor, RulesEngine, Window, WindowHandle, Workspace, WorkspaceId};
use crate::event::NativeEvent;
use crate::event_emitter::{window_to_info, workspace_to_info};
use crate::layout::Layout;
use crate::platform::{Host, MonitorInfo};

mod classify;
mod events;
mod placement;
mod switch;

use classify::*;
use events::*;
use placement::*;
use switch::*;

/// Work queued while handling one event and run after it, on the same thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostedAction {
    SwitchToApplication(WindowHandle),
    MoveWindow {
        handle: WindowHandle,
        from: WorkspaceId,
        to: WorkspaceId,
    },
    Foreground(WindowHandle),
}

/// Process-wide window bookkeeping: every workspace and monitor, the
/// handle index and the rule set windows are classified against.
pub struct Registry {
    /// Indexed by `id - 1`.
    pub workspaces: Vec<Workspace>,
    pub monitors: Vec<Monitor>,
    pub rules_engine: RulesEngine,
    /// Workspaces holding an instance of each managed handle.
    applications: HashMap<WindowHandle, Vec<WorkspaceId>>,
    /// Owned window -> owner.
    owners: HashMap<WindowHandle, WindowHandle>,
    /// Handles we hid ourselves, counted once per hide still to be reported.
    hidden: HashMap<WindowHandle, usize>,
    ignored: HashSet<WindowHandle>,
    current: WorkspaceId,
    previous: WorkspaceId,
    finished_initializing: bool,
    posted: VecDeque<PostedAction>,
    bar_heights: HashMap<String, u32>,
    starting_workspaces: Vec<WorkspaceId>,
}

impl Registry {
    pub fn new(config: &Config, monitors: Vec<MonitorInfo>) -> Result<Self, String> {
        if monitors.is_empty() {
            return Err("No monitors found".to_string());
        }
        let rules_engine = RulesEngine::from_configs(&config.rules)?;

        let mut workspaces: Vec<Workspace> = config
            .workspaces
            .iter()
            .enumerate()
            .map(|(i, ws)| Workspace::from_config(i + 1, ws))
            .collect();
        for ws in &mut workspaces {
            if ws.monitor >= monitors.len() {
                tracing::warn!(
                    "Workspace {} is configured for missing monitor {}, using monitor 0",
                    ws.id,
                    ws.monitor
                );
                ws.monitor = 0;
            }
        }

        Ok(Self {
            workspaces,
            monitors: monitors.into_iter().map(Monitor::new).collect(),
            rules_engine,
            applications: HashMap::new(),
            owners: HashMap::new(),
            hidden: HashMap::new(),
            ignored: HashSet::new(),
            current: 1,
            previous: 1,
            finished_initializing: false,
            posted: VecDeque::new(),
            bar_heights: config
                .bars
                .iter()
                .map(|b| (b.name.clone(), b.height))
                .collect(),
            starting_workspaces: config.starting_workspaces.clone(),
        })
    }

    pub fn current_workspace_id(&self) -> WorkspaceId {
        self.current
    }

    pub fn previous_workspace_id(&self) -> WorkspaceId {
        self.previous
    }

    pub fn current_workspace(&self) -> &Workspace {
        &self.workspaces[self.current - 1]
    }

    pub fn workspace(&self, id: WorkspaceId) -> Option<&Workspace> {
        self.workspaces.get(id.wrapping_sub(1))
    }

    pub fn workspace_mut(&mut self, id: WorkspaceId) -> Option<&mut Workspace> {
        self.workspaces.get_mut(id.wrapping_sub(1))
    }

    pub fn is_finished_initializing(&self) -> bool {
        self.finished_initializing
    }

    /// Workspaces holding `handle`, which may be an owned window.
    pub fn workspaces_of(&self, handle: WindowHandle) -> &[WorkspaceId] {
        self.applications
            .get(&self.resolve_owner(handle))
            .map_or(&[], |ids| ids.as_slice())
    }

    pub fn is_known(&self, handle: WindowHandle) -> bool {
        self.applications.contains_key(&self.resolve_owner(handle))
    }

    pub fn is_ignored(&self, handle: WindowHandle) -> bool {
        self.ignored.contains(&handle)
    }

    /// Maps an owned window to the handle it is tracked under.
    pub fn resolve_owner(&self, handle: WindowHandle) -> WindowHandle {
        self.owners.get(&handle).copied().unwrap_or(handle)
    }

    pub fn hidden_count(&self, handle: WindowHandle) -> usize {
        self.hidden.get(&handle).copied().unwrap_or(0)
    }

    pub fn window_count(&self) -> usize {
        self.applications.len()
    }

    /// Builds monitors and docks, classifies every existing window and shows
    /// the starting workspaces.
    pub fn start(&mut self, host: &Host) {
        start(self, host)
    }

    pub fn classify_and_route(&mut self, host: &Host, handle: WindowHandle) -> bool {
        classify_and_route(self, host, handle)
    }

    pub fn refresh(&mut self, host: &Host) {
        refresh(self, host)
    }

    pub fn handle_event(&mut self, host: &Host, event: NativeEvent) {
        handle_event(self, host, event);
        run_posted_actions(self, host);
    }

    pub fn run_posted_actions(&mut self, host: &Host) {
        run_posted_actions(self, host)
    }

    pub fn switch_to_workspace(
        &mut self,
        host: &Host,
        id: WorkspaceId,
        set_foreground: bool,
    ) -> bool {
        switch_to_workspace(self, host, id, set_foreground)
    }

    pub fn switch_to_previous_workspace(&mut self, host: &Host) -> bool {
        let previous = self.previous;
        switch_to_workspace(self, host, previous, true)
    }

    pub fn switch_to_application(&mut self, host: &Host, handle: WindowHandle) -> bool {
        switch_to_application(self, host, handle)
    }

    pub fn move_window(
        &mut self,
        host: &Host,
        handle: WindowHandle,
        from: WorkspaceId,
        to: WorkspaceId,
        follow: bool,
    ) -> bool {
        move_window(self, host, handle, from, to, follow)
    }

    pub fn move_to_previous_workspace(&mut self, host: &Host, handle: WindowHandle) -> bool {
        let (from, to) = (self.current, self.previous);
        move_window(self, host, handle, from, to, false)
    }

    pub fn add_window_to_workspace(
        &mut self,
        host: &Host,
        handle: WindowHandle,
        to: WorkspaceId,
        from: WorkspaceId,
    ) -> bool {
        add_window_to_workspace(self, host, handle, to, from)
    }

    pub fn remove_window_from_workspace(
        &mut self,
        host: &Host,
        handle: WindowHandle,
        workspace: WorkspaceId,
    ) -> bool {
        remove_window_from_workspace(self, host, handle, workspace)
    }

    pub fn remove_window_from_all_workspaces(&mut self, host: &Host, handle: WindowHandle) -> bool {
        remove_window_from_all_workspaces(self, host, handle)
    }

    pub fn toggle_window_floating(&mut self, host: &Host, handle: WindowHandle) -> bool {
        let handle = self.resolve_owner(handle);
        let current = self.current;
        self.workspace_mut(current)
            .is_some_and(|ws| ws.toggle_window_floating(host, handle))
    }

    pub fn toggle_titlebar(&mut self, host: &Host, handle: WindowHandle) -> bool {
        let handle = self.resolve_owner(handle);
        let current = self.current;
        self.workspace_mut(current)
            .is_some_and(|ws| ws.toggle_titlebar(host, handle))
    }

    pub fn toggle_border(&mut self, host: &Host, handle: WindowHandle) -> bool {
        let handle = self.resolve_owner(handle);
        let current = self.current;
        self.workspace_mut(current)
            .is_some_and(|ws| ws.toggle_border(host, handle))
    }

    pub fn toggle_taskbar_visibility(&mut self, host: &Host, handle: WindowHandle) -> bool {
        let handle = self.resolve_owner(handle);
        let current = self.current;
        self.workspace_mut(current)
            .is_some_and(|ws| ws.toggle_taskbar(host, handle))
    }

    pub fn shift_window(
        &mut self,
        host: &Host,
        handle: WindowHandle,
        direction: ShiftDirection,
    ) -> bool {
        let handle = self.resolve_owner(handle);
        let current = self.current;
        self.workspace_mut(current)
            .is_some_and(|ws| ws.shift_window(host, handle, direction))
    }

    pub fn change_layout(
        &mut self,
        host: &Host,
        workspace: WorkspaceId,
        layout: Box<dyn Layout>,
    ) -> Result<bool, String> {
        let ws = self
            .workspace_mut(workspace)
            .ok_or_else(|| format!("Workspace {} does not exist", workspace))?;
        Ok(ws.change_layout(host, layout))
    }

    pub fn layout_command(
        &mut self,
        host: &Host,
        workspace: WorkspaceId,
        cmd: &str,
        args: &[String],
    ) -> Result<(), String> {
        let ws = self
            .workspace_mut(workspace)
            .ok_or_else(|| format!("Workspace {} does not exist", workspace))?;
        ws.layout_command(host, cmd, args)
    }

    /// Shows every window and returns it to its original styles and placement.
    pub fn revert_all(&mut self, host: &Host) {
        tracing::info!("Reverting {} windows", self.applications.len());
        for ws in &mut self.workspaces {
            ws.revert_to_initial_values(host);
        }
        for monitor in &mut self.monitors {
            monitor.dispose(host);
        }
    }

    /// Instance of `handle` on the current workspace, or on the first
    /// workspace holding it.
    pub fn window(&self, handle: WindowHandle) -> Option<&Window> {
        let handle = self.resolve_owner(handle);
        let ids = self.applications.get(&handle)?;
        let id = if ids.contains(&self.current) {
            self.current
        } else {
            *ids.first()?
        };
        self.workspace(id)?.window(handle)
    }

    pub fn workspace_infos(&self) -> Vec<WorkspaceInfo> {
        self.workspaces.iter().map(workspace_to_info).collect()
    }

    pub fn window_infos(
        &self,
        workspace: Option<WorkspaceId>,
        focused: Option<WindowHandle>,
    ) -> Vec<WindowInfo> {
        self.workspaces
            .iter()
            .filter(|ws| workspace.map_or(true, |id| ws.id == id))
            .flat_map(|ws| {
                ws.windows()
                    .iter()
                    .map(move |w| window_to_info(w, ws.id, focused))
            })
            .collect()
    }

    pub fn state_info(&self, focused: Option<WindowHandle>) -> StateInfo {
        StateInfo {
            current_workspace: self.current,
            previous_workspace: self.previous,
            focused_window_id: focused.map(|h| self.resolve_owner(h)),
            window_count: self.applications.len(),
            workspace_count: self.workspaces.len(),
        }
    }

    pub fn snapshot(&self, focused: Option<WindowHandle>) -> StateEvent {
        StateEvent::Snapshot {
            workspaces: self.workspace_infos(),
            windows: self.window_infos(None, focused),
            current_workspace: self.current,
            focused_window_id: focused.map(|h| self.resolve_owner(h)),
        }
    }

    fn mark_hidden(&mut self, handle: WindowHandle) {
        *self.hidden.entry(handle).or_insert(0) += 1;
    }

    /// Consumes one pending self-hide of `handle`.
    fn consume_hidden(&mut self, handle: WindowHandle) -> bool {
        match self.hidden.get_mut(&handle) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.hidden.remove(&handle);
                }
                true
            }
            None => false,
        }
    }

    fn post(&mut self, action: PostedAction) {
        tracing::debug!("Posted {:?}", action);
        self.posted.push_back(action);
    }

    fn is_on_visible_workspace(&self, handle: WindowHandle) -> bool {
        self.workspaces_of(handle)
            .iter()
            .any(|&id| self.workspace(id).is_some_and(|ws| ws.is_visible))
    }

    fn monitor_of(&self, workspace: WorkspaceId) -> Option<usize> {
        self.workspace(workspace).map(|ws| ws.monitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::platform::mock::*;
    use crate::platform::{NativeWindow, ShowCommand, WindowSystem};
    use std::time::Duration;

    const RULES: &str = r#"{
        "workspaces": [
            { "layout": { "kind": "floating" } },
            { "layout": { "kind": "floating" } },
            { "layout": { "kind": "floating" } }
        ],
        "rules": [
            { "class_name": "^Notepad$", "rules": [ { "workspace": 2 } ] },
            { "class_name": "^Shared$", "rules": [ { "workspace": 1 }, { "workspace": 2 } ] },
            { "class_name": "^Left$", "rules": [ { "workspace": 1 } ] },
            { "class_name": "^Right$", "rules": [ { "workspace": 2 } ] },
            {
                "class_name": "^Mover$",
                "on_window_created": "move_window_to_current_workspace",
                "rules": [ { "workspace": 3 } ]
            },
            { "class_name": "^Hider$", "on_window_created": "hide_window", "rules": [ { "workspace": 3 } ] },
            { "class_name": "^Slow$", "try_again_after_ms": 200 },
            { "class_name": "^Ignored$", "is_managed": false },
            { }
        ]
    }"#;

    fn setup_registry(windows: Vec<NativeWindow>) -> (TestEnv, Registry) {
        let env = TestEnv::new(
            MockWindowSystem::new()
                .with_monitors(vec![create_test_monitor(0, 0, 0, 1920, 1080)])
                .with_windows(windows),
        );
        let config = Config::from_json(RULES).unwrap();
        let mut registry = Registry::new(&config, env.system.monitors()).unwrap();
        registry.start(&env.host());
        env.manipulator.take_calls();
        env.drain_events();
        (env, registry)
    }

    fn create_window(env: &TestEnv, registry: &mut Registry, handle: WindowHandle, class: &str) {
        env.system
            .add_window(create_test_window(handle, class, class, "app"));
        registry.handle_event(&env.host(), NativeEvent::WindowCreated(handle));
    }

    fn assert_consistent(registry: &Registry) {
        for ws in &registry.workspaces {
            for window in ws.windows() {
                let ids = registry.workspaces_of(window.handle);
                assert!(ids.contains(&ws.id));
                assert_eq!(window.workspaces_count, ids.len());
                let shared = ws.shared_windows().iter().any(|w| w.handle == window.handle);
                assert_eq!(shared, ids.len() > 1);
                let managed = ws.managed_windows().iter().any(|w| w.handle == window.handle);
                assert_eq!(managed, window.is_managed());
            }
        }
    }

    #[test]
    fn test_new_requires_monitor() {
        let config = Config::from_json(RULES).unwrap();
        assert!(Registry::new(&config, vec![]).is_err());
    }

    #[test]
    fn test_start_classifies_existing_windows() {
        let (_env, registry) = setup_registry(vec![
            create_test_window(1, "Left", "Left", "left"),
            create_test_window(2, "Right", "Right", "right"),
            create_test_window(3, "Editor", "Editor", "editor"),
        ]);

        assert_eq!(registry.current_workspace_id(), 1);
        assert_eq!(registry.workspaces_of(1), &[1]);
        assert_eq!(registry.workspaces_of(2), &[2]);
        assert_eq!(registry.workspaces_of(3), &[1]);
        assert!(registry.is_finished_initializing());
        assert!(registry.workspaces[0].is_visible);
        assert!(!registry.workspaces[1].is_visible);
        assert_consistent(&registry);

        // only the window of the hidden workspace was hidden, and it is
        // expected to report back once
        assert_eq!(registry.hidden_count(2), 1);
        assert_eq!(registry.hidden_count(1), 0);
    }

    #[test]
    fn test_notepad_rule_routes_to_workspace_two() {
        let (env, mut registry) = setup_registry(vec![]);

        create_window(&env, &mut registry, 10, "Notepad");

        assert_eq!(registry.workspaces_of(10), &[2]);
        assert!(!registry.workspaces[0].contains(10));
        assert_eq!(registry.workspaces[1].window(10).unwrap().workspaces_count, 1);
        // the default created action switches to the window's workspace
        assert_eq!(registry.current_workspace_id(), 2);
        assert_eq!(registry.previous_workspace_id(), 1);
        assert!(env.manipulator.foreground_calls().contains(&10));
    }

    #[test]
    fn test_unmanaged_and_unmatched_windows_are_ignored() {
        let (env, mut registry) = setup_registry(vec![]);

        create_window(&env, &mut registry, 20, "Ignored");
        assert!(registry.is_ignored(20));
        assert!(!registry.is_known(20));
        assert!(!registry.classify_and_route(&env.host(), 20));

        let mut child = create_test_window(21, "Child", "Child", "app");
        child.has_parent = true;
        env.system.add_window(child);
        assert!(!registry.classify_and_route(&env.host(), 21));
        assert!(!registry.is_ignored(21));
    }

    #[test]
    fn test_window_on_current_workspace_is_activated() {
        let (env, mut registry) = setup_registry(vec![]);

        create_window(&env, &mut registry, 30, "Editor");

        assert_eq!(registry.workspaces_of(30), &[1]);
        assert_eq!(env.manipulator.foreground_calls(), vec![30]);
        assert!(matches!(
            env.drain_events().as_slice(),
            [StateEvent::WindowAdded { workspace: 1, .. }]
        ));
    }

    #[test]
    fn test_try_again_after_settles_once() {
        let (env, mut registry) = setup_registry(vec![]);

        create_window(&env, &mut registry, 31, "Slow");

        assert!(registry.is_known(31));
        assert_eq!(env.system.total_slept(), Duration::from_millis(200));
    }

    #[test]
    fn test_move_action_is_posted() {
        let (env, mut registry) = setup_registry(vec![]);

        create_window(&env, &mut registry, 40, "Mover");

        assert_eq!(registry.workspaces_of(40), &[1]);
        assert!(!registry.workspaces[2].contains(40));
        assert_eq!(registry.current_workspace_id(), 1);
        assert_consistent(&registry);
    }

    #[test]
    fn test_hide_action_hides_window() {
        let (env, mut registry) = setup_registry(vec![]);

        create_window(&env, &mut registry, 41, "Hider");

        assert_eq!(registry.workspaces_of(41), &[3]);
        assert_eq!(env.manipulator.shown_commands(41), vec![ShowCommand::Hide]);
        assert_eq!(registry.hidden_count(41), 1);
        assert_eq!(env.system.total_slept(), env.timing.hide_window_delay());
    }

    #[test]
    fn test_add_window_to_workspace_makes_it_shared() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Editor", "Editor", "editor")]);

        assert!(registry.add_window_to_workspace(&env.host(), 1, 3, 1));

        assert_eq!(registry.workspaces_of(1), &[1, 3]);
        for id in [1, 3] {
            let ws = registry.workspace(id).unwrap();
            assert_eq!(ws.window(1).unwrap().workspaces_count, 2);
            assert!(ws.shared_windows().iter().any(|w| w.handle == 1));
        }
        assert_consistent(&registry);

        assert!(!registry.add_window_to_workspace(&env.host(), 1, 3, 1));
        assert!(!registry.add_window_to_workspace(&env.host(), 1, 9, 1));
    }

    #[test]
    fn test_remove_window_from_workspace() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Shared", "Shared", "app")]);
        assert_eq!(registry.workspaces_of(1), &[1, 2]);

        assert!(registry.remove_window_from_workspace(&env.host(), 1, 2));
        assert_eq!(registry.workspaces_of(1), &[1]);
        assert_eq!(registry.workspaces[0].window(1).unwrap().workspaces_count, 1);
        assert!(registry.workspaces[0].shared_windows().is_empty());
        assert_consistent(&registry);

        // the last instance stays
        assert!(!registry.remove_window_from_workspace(&env.host(), 1, 1));
    }

    #[test]
    fn test_unshare_on_hidden_workspace_then_reshare() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Shared", "Shared", "app")]);
        assert!(!registry.workspaces[1].is_visible);

        assert!(registry.remove_window_from_workspace(&env.host(), 1, 1));
        assert_eq!(registry.workspaces_of(1), &[2]);
        assert!(registry.workspaces[1].shared_windows().is_empty());
        assert_consistent(&registry);

        assert!(registry.add_window_to_workspace(&env.host(), 1, 3, 2));
        assert_eq!(registry.workspaces_of(1), &[2, 3]);
        assert_consistent(&registry);

        assert!(registry.switch_to_workspace(&env.host(), 2, true));
        assert_eq!(registry.workspaces_of(1), &[2, 3]);
        assert!(registry.workspaces[1]
            .shared_windows()
            .iter()
            .any(|w| w.handle == 1));
        assert_consistent(&registry);
    }

    #[test]
    fn test_switch_across_two_monitors() {
        let env = TestEnv::new(
            MockWindowSystem::new()
                .with_monitors(vec![
                    create_test_monitor(0, 0, 0, 1920, 1080),
                    create_test_monitor(1, 1920, 0, 1280, 1024),
                ])
                .with_windows(vec![
                    create_test_window(1, "Left", "Left", "app"),
                    create_test_window(2, "Right", "Right", "app"),
                ]),
        );
        let config = Config::from_json(
            r#"{
                "workspaces": [
                    { "monitor": 0, "layout": { "kind": "floating" } },
                    { "monitor": 1, "layout": { "kind": "floating" } },
                    { "monitor": 0, "layout": { "kind": "floating" } }
                ],
                "rules": [
                    { "class_name": "^Left$", "rules": [ { "workspace": 1 } ] },
                    { "class_name": "^Right$", "rules": [ { "workspace": 2 } ] },
                    { }
                ]
            }"#,
        )
        .unwrap();
        let mut registry = Registry::new(&config, env.system.monitors()).unwrap();
        registry.start(&env.host());
        env.manipulator.take_calls();

        assert!(registry.workspaces[0].is_visible);
        assert!(registry.workspaces[1].is_visible);
        assert_eq!(registry.workspace(2).unwrap().area().monitor, 1);

        // already visible on the other monitor: only the current workspace changes
        assert!(registry.switch_to_workspace(&env.host(), 2, false));
        assert_eq!(registry.current_workspace_id(), 2);
        assert!(registry.workspaces[0].is_visible);
        assert!(!registry.workspaces[0].is_current);
        assert!(env.manipulator.batches().iter().all(|b| b.is_empty()));

        assert!(registry.switch_to_workspace(&env.host(), 3, false));
        assert_eq!(registry.monitors[0].visible_workspace, Some(3));
        assert_eq!(registry.monitors[1].visible_workspace, Some(2));
        assert!(!registry.workspaces[0].is_visible);
        assert!(registry.workspaces[1].is_visible);
        let entries: Vec<_> = env.manipulator.batches().into_iter().flatten().collect();
        assert!(entries.iter().any(|e| e.handle == 1 && e.flags.hide));
        assert!(!entries.iter().any(|e| e.handle == 2));
        assert_eq!(registry.previous_workspace_id(), 2);
        assert_consistent(&registry);
    }

    #[test]
    fn test_remove_visible_instance_hides_window() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Shared", "Shared", "app")]);

        assert!(registry.remove_window_from_workspace(&env.host(), 1, 1));
        assert_eq!(env.manipulator.shown_commands(1), vec![ShowCommand::Hide]);
        assert_eq!(registry.hidden_count(1), 1);
    }

    #[test]
    fn test_switch_shows_before_hiding_and_keeps_shared_window() {
        let (env, mut registry) = setup_registry(vec![
            create_test_window(1, "Shared", "Shared", "app"),
            create_test_window(2, "Left", "Left", "app"),
            create_test_window(3, "Right", "Right", "app"),
        ]);

        assert!(registry.switch_to_workspace(&env.host(), 2, true));

        let batches = env.manipulator.batches();
        assert_eq!(batches.len(), 2);
        let mut shown: Vec<_> = batches[0].iter().map(|e| e.handle).collect();
        shown.sort();
        assert_eq!(shown, vec![1, 3]);
        assert!(batches[0].iter().all(|e| e.flags.show));
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1][0].handle, 2);
        assert!(batches[1][0].flags.hide);
        assert!(!batches
            .iter()
            .flatten()
            .any(|e| e.handle == 1 && e.flags.hide));

        assert!(registry.workspaces[1].is_current);
        assert!(!registry.workspaces[0].is_current);
        assert!(!registry.switch_to_workspace(&env.host(), 2, true));
    }

    #[test]
    fn test_self_hidden_notification_is_idempotent() {
        let (env, mut registry) = setup_registry(vec![
            create_test_window(1, "Left", "Left", "app"),
            create_test_window(2, "Right", "Right", "app"),
        ]);
        registry.switch_to_workspace(&env.host(), 2, false);
        assert_eq!(registry.hidden_count(1), 1);
        env.system.set_visible(1, false);

        registry.handle_event(&env.host(), NativeEvent::WindowHidden(1));
        registry.handle_event(&env.host(), NativeEvent::WindowHidden(1));

        assert_eq!(registry.hidden_count(1), 0);
        assert!(registry.workspaces[0].contains(1));
        assert_eq!(registry.workspaces_of(1), &[1]);
    }

    #[test]
    fn test_window_hiding_itself_is_dropped() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Left", "Left", "app")]);
        env.system.set_visible(1, false);

        registry.handle_event(&env.host(), NativeEvent::WindowHidden(1));

        assert!(!registry.is_known(1));
        assert!(registry.workspaces[0].windows().is_empty());

        env.system.set_visible(1, true);
        registry.handle_event(&env.host(), NativeEvent::WindowShown(1));
        assert!(registry.is_known(1));
    }

    #[test]
    fn test_destroyed_window_is_removed_everywhere() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Shared", "Shared", "app")]);

        env.system.remove_window(1);
        registry.handle_event(&env.host(), NativeEvent::WindowDestroyed(1));

        assert!(!registry.is_known(1));
        assert!(registry.workspaces.iter().all(|ws| !ws.contains(1)));
        assert_eq!(registry.window_count(), 0);
    }

    #[test]
    fn test_activating_hidden_window_switches_workspace() {
        let (env, mut registry) = setup_registry(vec![create_test_window(3, "Right", "Right", "app")]);

        registry.handle_event(&env.host(), NativeEvent::WindowActivated(Some(3)));

        assert_eq!(registry.current_workspace_id(), 2);
        assert!(env.manipulator.foreground_calls().contains(&3));
    }

    #[test]
    fn test_minimize_events_reach_every_instance() {
        let (env, mut registry) = setup_registry(vec![
            create_test_window(1, "Shared", "Shared", "app"),
            create_test_window(2, "Left", "Left", "app"),
        ]);

        registry.handle_event(&env.host(), NativeEvent::MinimizeStart(1));
        assert!(registry.workspaces[0].window(1).unwrap().is_minimized);
        assert!(registry.workspaces[1].window(1).unwrap().is_minimized);
        assert_consistent(&registry);

        registry.handle_event(&env.host(), NativeEvent::MinimizeEnd(1));
        assert!(!registry.workspaces[1].window(1).unwrap().is_minimized);
        assert_consistent(&registry);
    }

    #[test]
    fn test_move_window_with_follow() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Left", "Left", "app")]);

        assert!(registry.move_window(&env.host(), 1, 1, 3, false));
        assert_eq!(registry.workspaces_of(1), &[3]);
        assert_eq!(registry.hidden_count(1), 1);

        assert!(registry.move_window(&env.host(), 1, 3, 2, true));
        assert_eq!(registry.workspaces_of(1), &[2]);
        assert_eq!(registry.current_workspace_id(), 2);
        assert!(!registry.move_window(&env.host(), 1, 3, 1, false));
        assert_consistent(&registry);
    }

    #[test]
    fn test_switch_to_previous_workspace() {
        let (env, mut registry) = setup_registry(vec![]);
        registry.switch_to_workspace(&env.host(), 3, false);
        registry.switch_to_previous_workspace(&env.host());
        assert_eq!(registry.current_workspace_id(), 1);
        assert_eq!(registry.previous_workspace_id(), 3);
    }

    #[test]
    fn test_title_change_updates_every_instance() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Shared", "Shared", "app")]);
        env.system.set_title(1, "Renamed");

        registry.handle_event(&env.host(), NativeEvent::TitleChanged(1));

        assert!(registry
            .workspaces
            .iter()
            .filter_map(|ws| ws.window(1))
            .all(|w| w.display_name == "Renamed"));
        assert!(matches!(
            env.drain_events().as_slice(),
            [StateEvent::WindowTitleChanged { window_id: 1, .. }]
        ));
    }

    #[test]
    fn test_refresh_drops_vanished_windows() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Left", "Left", "app")]);
        env.system.remove_window(1);
        env.system.add_window(create_test_window(2, "Editor", "Editor", "app"));

        registry.refresh(&env.host());

        assert!(!registry.is_known(1));
        assert_eq!(registry.workspaces_of(2), &[1]);
    }

    #[test]
    fn test_owned_windows_route_to_owner() {
        let (env, mut registry) = setup_registry(vec![create_test_window(1, "Left", "Left", "app")]);
        registry
            .workspace_mut(1)
            .unwrap()
            .window_mut(1)
            .unwrap()
            .add_owned_window(5);
        registry.owners.insert(5, 1);

        assert_eq!(registry.resolve_owner(5), 1);
        assert_eq!(registry.workspaces_of(5), &[1]);
        assert!(registry.toggle_window_floating(&env.host(), 5));
        assert!(registry.workspaces[0].window(1).unwrap().is_floating);
    }

    #[test]
    fn test_revert_all_restores_windows() {
        let (env, mut registry) = setup_registry(vec![create_test_window(2, "Right", "Right", "app")]);

        registry.revert_all(&env.host());

        assert_eq!(env.manipulator.shown_commands(2), vec![ShowCommand::ShowNa]);
    }

    #[test]
    fn test_state_info() {
        let (env, registry) = setup_registry(vec![create_test_window(1, "Left", "Left", "app")]);
        let info = registry.state_info(env.system.foreground_window());
        assert_eq!(info.current_workspace, 1);
        assert_eq!(info.window_count, 1);
        assert_eq!(info.workspace_count, 3);
        assert_eq!(registry.window_infos(Some(1), None).len(), 1);
        assert_eq!(registry.workspace_infos().len(), 3);
    }

    #[test]
    fn test_snapshot_lists_every_workspace() {
        let (_env, registry) = setup_registry(vec![
            create_test_window(1, "Left", "Left", "app"),
            create_test_window(2, "Right", "Right", "app"),
        ]);
        match registry.snapshot(Some(2)) {
            StateEvent::Snapshot {
                workspaces,
                windows,
                current_workspace,
                focused_window_id,
            } => {
                assert_eq!(workspaces.len(), 3);
                assert_eq!(windows.len(), 2);
                assert_eq!(current_workspace, 1);
                assert_eq!(focused_window_id, Some(2));
                assert!(windows.iter().any(|w| w.id == 2 && w.is_focused));
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }
}
