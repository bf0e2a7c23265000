use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{style, VisibilityState, WorkspaceId};
use crate::platform::NativeWindow;

pub type WindowMatcher = Arc<dyn Fn(&NativeWindow) -> bool + Send + Sync>;

/// What to do when a window appears on a workspace that is not current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnWindowShownAction {
    #[default]
    SwitchToWindowsWorkspace,
    MoveWindowToCurrentWorkspace,
    TemporarilyShowWindowOnCurrentWorkspace,
    HideWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnWindowCreatedOnCurrentWorkspaceAction {
    #[default]
    ActivateWindow,
    MoveToBottom,
}

/// Placement and per-workspace overrides for one target workspace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// Target workspace. 0 means whichever workspace is current at match time.
    pub workspace: WorkspaceId,
    pub is_floating: bool,
    pub titlebar: VisibilityState,
    pub in_taskbar: VisibilityState,
    pub border: VisibilityState,
    pub redraw_on_show: bool,
    pub hide_from_taskbar_when_inactive: bool,
}

impl Rule {
    pub fn on_workspace(workspace: WorkspaceId) -> Self {
        Self {
            workspace,
            ..Default::default()
        }
    }
}

/// Serialized form of a [`ProgramRule`] as found in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramRuleConfig {
    pub class_name: String,
    pub display_name: String,
    pub process_name: String,
    pub style_contains: u32,
    pub style_not_contains: u32,
    pub ex_style_contains: u32,
    pub ex_style_not_contains: u32,
    pub is_managed: bool,
    pub try_again_after_ms: Option<u64>,
    pub window_created_delay_ms: Option<u64>,
    pub wait_for_input_idle: bool,
    pub redraw_desktop_on_window_created: bool,
    pub handle_owned_windows: bool,
    pub on_window_created_on_current_workspace: OnWindowCreatedOnCurrentWorkspaceAction,
    pub on_window_created: OnWindowShownAction,
    pub on_hidden_window_shown: OnWindowShownAction,
    pub show_on_workspaces_count: usize,
    pub rules: Vec<Rule>,
}

impl Default for ProgramRuleConfig {
    fn default() -> Self {
        Self {
            class_name: ".*".to_string(),
            display_name: ".*".to_string(),
            process_name: ".*".to_string(),
            style_contains: 0,
            style_not_contains: 0,
            ex_style_contains: 0,
            ex_style_not_contains: 0,
            is_managed: true,
            try_again_after_ms: None,
            window_created_delay_ms: None,
            wait_for_input_idle: false,
            redraw_desktop_on_window_created: false,
            handle_owned_windows: false,
            on_window_created_on_current_workspace: Default::default(),
            on_window_created: Default::default(),
            on_hidden_window_shown: Default::default(),
            show_on_workspaces_count: 0,
            rules: Vec::new(),
        }
    }
}

/// Predicate over a native window plus the behavior applied to its matches.
#[derive(Clone)]
pub struct ProgramRule {
    /// `None` matches any name.
    pub class_name: Option<Regex>,
    pub display_name: Option<Regex>,
    pub process_name: Option<Regex>,
    pub style_contains: u32,
    pub style_not_contains: u32,
    pub ex_style_contains: u32,
    pub ex_style_not_contains: u32,
    pub custom_matcher: WindowMatcher,
    pub owned_window_matcher: WindowMatcher,

    pub is_managed: bool,
    pub try_again_after: Option<Duration>,
    pub window_created_delay: Option<Duration>,
    pub wait_for_input_idle: bool,
    pub redraw_desktop_on_window_created: bool,
    pub handle_owned_windows: bool,
    pub on_window_created_on_current_workspace: OnWindowCreatedOnCurrentWorkspaceAction,
    pub on_window_created: OnWindowShownAction,
    pub on_hidden_window_shown: OnWindowShownAction,
    pub rules: Vec<Rule>,
}

/// Rejects tool windows and windows that have an owner.
fn default_matcher() -> WindowMatcher {
    Arc::new(|w: &NativeWindow| w.ex_style & style::WS_EX_TOOLWINDOW == 0 && w.owner.is_none())
}

fn default_owned_window_matcher() -> WindowMatcher {
    Arc::new(|w: &NativeWindow| w.ex_style & style::WS_EX_TOOLWINDOW == 0)
}

impl Default for ProgramRule {
    fn default() -> Self {
        Self {
            class_name: None,
            display_name: None,
            process_name: None,
            style_contains: 0,
            style_not_contains: 0,
            ex_style_contains: 0,
            ex_style_not_contains: 0,
            custom_matcher: default_matcher(),
            owned_window_matcher: default_owned_window_matcher(),
            is_managed: true,
            try_again_after: None,
            window_created_delay: None,
            wait_for_input_idle: false,
            redraw_desktop_on_window_created: false,
            handle_owned_windows: false,
            on_window_created_on_current_workspace: Default::default(),
            on_window_created: Default::default(),
            on_hidden_window_shown: Default::default(),
            rules: vec![Rule::default()],
        }
    }
}

impl fmt::Debug for ProgramRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramRule")
            .field("class_name", &pattern(&self.class_name))
            .field("display_name", &pattern(&self.display_name))
            .field("process_name", &pattern(&self.process_name))
            .field("is_managed", &self.is_managed)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

fn pattern(regex: &Option<Regex>) -> &str {
    regex.as_ref().map_or(".*", |r| r.as_str())
}

fn compile(field: &str, pattern: &str) -> Result<Option<Regex>, String> {
    if pattern == ".*" {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|e| format!("Invalid {} pattern '{}': {}", field, pattern, e))
}

fn matches(regex: &Option<Regex>, text: &str) -> bool {
    regex.as_ref().map_or(true, |r| r.is_match(text))
}

impl ProgramRule {
    pub fn from_config(config: &ProgramRuleConfig) -> Result<Self, String> {
        let rules = if !config.is_managed {
            Vec::new()
        } else if config.rules.is_empty() && config.show_on_workspaces_count == 0 {
            vec![Rule::default()]
        } else {
            expand_workspace_rules(config.rules.clone(), config.show_on_workspaces_count)
        };

        Ok(Self {
            class_name: compile("class_name", &config.class_name)?,
            display_name: compile("display_name", &config.display_name)?,
            process_name: compile("process_name", &config.process_name)?,
            style_contains: config.style_contains,
            style_not_contains: config.style_not_contains,
            ex_style_contains: config.ex_style_contains,
            ex_style_not_contains: config.ex_style_not_contains,
            is_managed: config.is_managed,
            try_again_after: config.try_again_after_ms.map(Duration::from_millis),
            window_created_delay: config.window_created_delay_ms.map(Duration::from_millis),
            wait_for_input_idle: config.wait_for_input_idle,
            redraw_desktop_on_window_created: config.redraw_desktop_on_window_created,
            handle_owned_windows: config.handle_owned_windows,
            on_window_created_on_current_workspace: config.on_window_created_on_current_workspace,
            on_window_created: config.on_window_created,
            on_hidden_window_shown: config.on_hidden_window_shown,
            rules,
            ..Default::default()
        })
    }

    pub fn is_match(&self, window: &NativeWindow) -> bool {
        matches(&self.class_name, &window.class_name)
            && matches(&self.display_name, &window.title)
            && matches(&self.process_name, &window.process_name)
            && window.style & self.style_contains == self.style_contains
            && window.style & self.style_not_contains == 0
            && window.ex_style & self.ex_style_contains == self.ex_style_contains
            && window.ex_style & self.ex_style_not_contains == 0
            && (self.custom_matcher)(window)
    }
}

/// Appends a default rule for each workspace in `1..=count` not already targeted.
fn expand_workspace_rules(mut rules: Vec<Rule>, count: usize) -> Vec<Rule> {
    let missing: Vec<WorkspaceId> = (1..=count)
        .filter(|i| rules.iter().all(|r| r.workspace != *i))
        .collect();
    rules.extend(missing.into_iter().map(Rule::on_workspace));
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::create_test_window;

    #[test]
    fn test_default_rule_matches_plain_window() {
        let rule = ProgramRule::default();
        let window = create_test_window(1, "Notepad", "Untitled - Notepad", "notepad");
        assert!(rule.is_match(&window));
        assert_eq!(rule.rules, vec![Rule::default()]);
    }

    #[test]
    fn test_default_matcher_rejects_tool_and_owned_windows() {
        let rule = ProgramRule::default();

        let mut tool = create_test_window(1, "Tool", "Tool", "tool");
        tool.ex_style |= style::WS_EX_TOOLWINDOW;
        assert!(!rule.is_match(&tool));

        let mut owned = create_test_window(2, "#32770", "Save As", "notepad");
        owned.owner = Some(1);
        assert!(!rule.is_match(&owned));
        assert!((rule.owned_window_matcher)(&owned));
    }

    #[test]
    fn test_regex_and_style_predicates() {
        let config = ProgramRuleConfig {
            class_name: "^Notepad$".to_string(),
            style_contains: style::WS_CAPTION,
            ex_style_not_contains: style::WS_EX_TOPMOST,
            ..Default::default()
        };
        let rule = ProgramRule::from_config(&config).unwrap();

        let window = create_test_window(1, "Notepad", "a.txt", "notepad");
        assert!(rule.is_match(&window));

        let other = create_test_window(2, "NotepadPlus", "a.txt", "notepad++");
        assert!(!rule.is_match(&other));

        let mut captionless = window.clone();
        captionless.style &= !style::WS_CAPTION;
        assert!(!rule.is_match(&captionless));

        let mut topmost = window.clone();
        topmost.ex_style |= style::WS_EX_TOPMOST;
        assert!(!rule.is_match(&topmost));
    }

    #[test]
    fn test_invalid_regex_is_error() {
        let config = ProgramRuleConfig {
            display_name: "(".to_string(),
            ..Default::default()
        };
        let err = ProgramRule::from_config(&config).unwrap_err();
        assert!(err.contains("display_name"));
    }

    #[test]
    fn test_show_on_workspaces_count_expansion() {
        let config = ProgramRuleConfig {
            rules: vec![Rule {
                workspace: 2,
                is_floating: true,
                ..Default::default()
            }],
            show_on_workspaces_count: 3,
            ..Default::default()
        };
        let rule = ProgramRule::from_config(&config).unwrap();
        let workspaces: Vec<_> = rule.rules.iter().map(|r| r.workspace).collect();
        assert_eq!(workspaces, vec![2, 1, 3]);
        assert!(rule.rules[0].is_floating);
        assert!(!rule.rules[1].is_floating);
    }

    #[test]
    fn test_rule_config_deserialize_defaults() {
        let config: ProgramRuleConfig =
            serde_json::from_str(r#"{ "process_name": "^firefox$", "on_window_created": "hide_window" }"#)
                .unwrap();
        assert_eq!(config.class_name, ".*");
        assert!(config.is_managed);
        assert_eq!(config.on_window_created, OnWindowShownAction::HideWindow);
        assert_eq!(
            config.on_hidden_window_shown,
            OnWindowShownAction::SwitchToWindowsWorkspace
        );
    }
}
