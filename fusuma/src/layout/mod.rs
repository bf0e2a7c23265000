mod floating;
mod full_screen;
mod tile;

pub use floating::*;
pub use full_screen::*;
pub use tile::*;

use fusuma_ipc::LayoutKind;

use crate::core::{LayoutConfig, Rect, Window};
use crate::platform::Host;

/// Screen region a workspace lays its windows out in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Area {
    pub monitor: usize,
    pub bounds: Rect,
    pub working_area: Rect,
}

/// Geometry and behavior strategy for the managed windows of one workspace.
///
/// `windows` is always the full managed list of the workspace, in tiling order.
pub trait Layout {
    fn kind(&self) -> LayoutKind;

    fn name(&self) -> &'static str;

    fn symbol(&self, window_count: usize) -> String;

    /// Whether shared windows keep their own placement across workspace switches.
    fn should_save_and_restore_shared_window_position(&self) -> bool;

    /// Only called while the workspace is visible.
    fn reposition(&self, host: &Host, windows: &[&Window], area: Area);

    /// The window hooks below receive `relayout == false` while the workspace
    /// is hidden and must leave geometry alone then.
    fn window_created(
        &self,
        host: &Host,
        _window: &Window,
        windows: &[&Window],
        area: Area,
        relayout: bool,
    ) {
        if relayout {
            self.reposition(host, windows, area);
        }
    }

    fn window_destroyed(
        &self,
        host: &Host,
        _window: &Window,
        windows: &[&Window],
        area: Area,
        relayout: bool,
    ) {
        if relayout {
            self.reposition(host, windows, area);
        }
    }

    fn window_minimized(
        &self,
        _host: &Host,
        _window: &Window,
        _windows: &[&Window],
        _area: Area,
        _relayout: bool,
    ) {
    }

    fn window_restored(
        &self,
        _host: &Host,
        _window: &Window,
        _windows: &[&Window],
        _area: Area,
        _relayout: bool,
    ) {
    }

    fn window_titlebar_toggled(
        &self,
        _host: &Host,
        _window: &Window,
        _area: Area,
        _relayout: bool,
    ) {
    }

    fn window_border_toggled(
        &self,
        _host: &Host,
        _window: &Window,
        _area: Area,
        _relayout: bool,
    ) {
    }

    /// Runtime tuning. Returns whether the workspace needs a reposition.
    fn command(&mut self, cmd: &str, _args: &[String]) -> Result<bool, String> {
        Err(format!("{} layout has no command '{}'", self.name(), cmd))
    }
}

pub fn from_config(config: &LayoutConfig) -> Box<dyn Layout> {
    match config {
        LayoutConfig::Tile {
            layout_axis,
            master_axis,
            stack_axis,
            master_factor,
            master_count,
        } => Box::new(TileLayout::new(
            *layout_axis,
            *master_axis,
            *stack_axis,
            *master_factor,
            *master_count,
        )),
        LayoutConfig::FullScreen => Box::new(FullScreenLayout),
        LayoutConfig::Floating => Box::new(FloatingLayout),
    }
}

pub fn from_kind(kind: LayoutKind) -> Box<dyn Layout> {
    match kind {
        LayoutKind::Tile => Box::new(TileLayout::default()),
        LayoutKind::FullScreen => Box::new(FullScreenLayout),
        LayoutKind::Floating => Box::new(FloatingLayout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_default_is_tile() {
        let layout = from_config(&LayoutConfig::default());
        assert_eq!(layout.kind(), LayoutKind::Tile);
        assert_eq!(layout.name(), "Tile");
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(from_kind(LayoutKind::FullScreen).name(), "Full Screen");
        assert_eq!(from_kind(LayoutKind::Floating).symbol(3), "><>");
    }

    #[test]
    fn test_floating_rejects_commands() {
        let mut layout = from_kind(LayoutKind::Floating);
        let err = layout.command("inc-master-count", &[]).unwrap_err();
        assert!(err.contains("inc-master-count"));
    }
}
