use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use fusuma_ipc::Command;
use serde::{Deserialize, Serialize};

use super::ProgramRuleConfig;
use crate::layout::LayoutAxis;

/// Delays and probe timeouts used by the settle-and-verify logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub minimize_restore_delay_ms: u64,
    pub hung_window_timeout_ms: u64,
    pub hide_window_delay_ms: u64,
    pub owned_windows_retry_ms: u64,
    pub hidden_window_shown_delay_ms: u64,
    pub input_idle_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            minimize_restore_delay_ms: 100,
            hung_window_timeout_ms: 1000,
            hide_window_delay_ms: 500,
            owned_windows_retry_ms: 500,
            hidden_window_shown_delay_ms: 1000,
            input_idle_timeout_ms: 5000,
        }
    }
}

impl Timing {
    pub fn minimize_restore_delay(&self) -> Duration {
        Duration::from_millis(self.minimize_restore_delay_ms)
    }

    pub fn hung_window_timeout(&self) -> Duration {
        Duration::from_millis(self.hung_window_timeout_ms)
    }

    pub fn hide_window_delay(&self) -> Duration {
        Duration::from_millis(self.hide_window_delay_ms)
    }

    pub fn owned_windows_retry(&self) -> Duration {
        Duration::from_millis(self.owned_windows_retry_ms)
    }

    pub fn hidden_window_shown_delay(&self) -> Duration {
        Duration::from_millis(self.hidden_window_shown_delay_ms)
    }

    pub fn input_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.input_idle_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutConfig {
    Tile {
        #[serde(default = "default_layout_axis")]
        layout_axis: LayoutAxis,
        #[serde(default = "default_master_axis")]
        master_axis: LayoutAxis,
        #[serde(default = "default_stack_axis")]
        stack_axis: LayoutAxis,
        #[serde(default = "default_master_factor")]
        master_factor: f64,
        #[serde(default = "default_master_count")]
        master_count: usize,
    },
    FullScreen,
    Floating,
}

fn default_layout_axis() -> LayoutAxis {
    LayoutAxis::LeftToRight
}

fn default_master_axis() -> LayoutAxis {
    LayoutAxis::Monocle
}

fn default_stack_axis() -> LayoutAxis {
    LayoutAxis::TopToBottom
}

fn default_master_factor() -> f64 {
    0.6
}

fn default_master_count() -> usize {
    1
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig::Tile {
            layout_axis: default_layout_axis(),
            master_axis: default_master_axis(),
            stack_axis: default_stack_axis(),
            master_factor: default_master_factor(),
            master_count: default_master_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub monitor: usize,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub top_bars: Vec<String>,
    #[serde(default)]
    pub bottom_bars: Vec<String>,
    #[serde(default)]
    pub reposition_on_switched_to: bool,
}

/// A status bar surface. Height 0 reserves no screen space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarConfig {
    pub name: String,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingConfig {
    pub key: String,
    pub command: Command,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timing: Timing,
    pub workspaces: Vec<WorkspaceConfig>,
    #[serde(default)]
    pub bars: Vec<BarConfig>,
    #[serde(default)]
    pub rules: Vec<ProgramRuleConfig>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
    /// Workspace shown on each monitor at startup, indexed by monitor.
    #[serde(default)]
    pub starting_workspaces: Vec<usize>,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fusuma").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!(
            "Loaded config from {} ({} workspaces, {} rules, {} bindings)",
            path.display(),
            config.workspaces.len(),
            config.rules.len(),
            config.bindings.len()
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workspaces.is_empty() {
            bail!("At least one workspace must be configured");
        }

        for (i, ws) in self.workspaces.iter().enumerate() {
            for bar in ws.top_bars.iter().chain(ws.bottom_bars.iter()) {
                if !self.bars.iter().any(|b| &b.name == bar) {
                    bail!("Workspace {} references unknown bar '{}'", i + 1, bar);
                }
            }
            if let LayoutConfig::Tile { master_factor, .. } = ws.layout {
                if !(0.0..=1.0).contains(&master_factor) {
                    bail!(
                        "Workspace {} master_factor {} is outside [0, 1]",
                        i + 1,
                        master_factor
                    );
                }
            }
        }

        for &id in &self.starting_workspaces {
            if id == 0 || id > self.workspaces.len() {
                bail!("Starting workspace {} does not exist", id);
            }
        }

        for rule in &self.rules {
            for target in &rule.rules {
                if target.workspace > self.workspaces.len() {
                    bail!(
                        "Rule for class '{}' targets missing workspace {}",
                        rule.class_name,
                        target.workspace
                    );
                }
            }
        }

        Ok(())
    }

    pub fn bar_height(&self, name: &str) -> u32 {
        self.bars
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.height)
            .unwrap_or(0)
    }

    pub fn workspace_name(&self, id: usize) -> String {
        match self.workspaces.get(id.wrapping_sub(1)) {
            Some(ws) if !ws.name.is_empty() => ws.name.clone(),
            _ => id.to_string(),
        }
    }
}
