use super::{ProgramRule, ProgramRuleConfig, Rule, WorkspaceId};
use crate::platform::NativeWindow;

/// Engine for storing and matching program rules.
/// Rules are tried in insertion order; the first match wins.
#[derive(Debug, Default)]
pub struct RulesEngine {
    rules: Vec<ProgramRule>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn from_configs(configs: &[ProgramRuleConfig]) -> Result<Self, String> {
        let mut engine = Self::new();
        for (i, config) in configs.iter().enumerate() {
            let rule =
                ProgramRule::from_config(config).map_err(|e| format!("Rule {}: {}", i + 1, e))?;
            engine.add_rule(rule);
        }
        Ok(engine)
    }

    pub fn add_rule(&mut self, rule: ProgramRule) {
        tracing::debug!("Adding program rule: {:?}", rule);
        self.rules.push(rule);
    }

    pub fn find_match(&self, window: &NativeWindow) -> Option<&ProgramRule> {
        self.rules.iter().find(|rule| rule.is_match(window))
    }
}

/// Resolves workspace 0 to `current` and drops duplicate targets.
///
/// When the rules hold both a 0-rule and an explicit rule for the current
/// workspace, the explicit rule wins and the 0-rules are dropped.
pub fn resolve_targets(rules: &[Rule], current: WorkspaceId) -> Vec<Rule> {
    let has_explicit_current = rules.iter().any(|r| r.workspace == current);
    let mut resolved: Vec<Rule> = Vec::with_capacity(rules.len());

    for rule in rules {
        let workspace = if rule.workspace == 0 {
            if has_explicit_current {
                continue;
            }
            current
        } else {
            rule.workspace
        };

        if resolved.iter().any(|r| r.workspace == workspace) {
            continue;
        }
        resolved.push(Rule {
            workspace,
            ..rule.clone()
        });
    }

    resolved
}
