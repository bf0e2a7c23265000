use serde::{Deserialize, Serialize};

use super::{OnWindowShownAction, ProgramRule, Rule};
use crate::platform::{Host, NativeWindow, ShowCommand};

/// Opaque native window identity.
pub type WindowHandle = u64;
pub type WorkspaceId = usize;

/// Native style bits the engine reads and rewrites.
pub mod style {
    pub const WS_CHILD: u32 = 0x4000_0000;
    pub const WS_VISIBLE: u32 = 0x1000_0000;
    pub const WS_CAPTION: u32 = 0x00C0_0000;
    pub const WS_SYSMENU: u32 = 0x0008_0000;
    pub const WS_SIZEBOX: u32 = 0x0004_0000;
    pub const WS_MINIMIZEBOX: u32 = 0x0002_0000;
    pub const WS_MAXIMIZEBOX: u32 = 0x0001_0000;
    pub const WS_OVERLAPPEDWINDOW: u32 =
        WS_CAPTION | WS_SYSMENU | WS_SIZEBOX | WS_MINIMIZEBOX | WS_MAXIMIZEBOX;

    pub const WS_EX_DLGMODALFRAME: u32 = 0x0000_0001;
    pub const WS_EX_TOPMOST: u32 = 0x0000_0008;
    pub const WS_EX_TOOLWINDOW: u32 = 0x0000_0080;
    pub const WS_EX_WINDOWEDGE: u32 = 0x0000_0100;
    pub const WS_EX_CLIENTEDGE: u32 = 0x0000_0200;
    pub const WS_EX_STATICEDGE: u32 = 0x0002_0000;
    pub const WS_EX_APPWINDOW: u32 = 0x0004_0000;
    pub const WS_EX_BORDER_MASK: u32 =
        WS_EX_DLGMODALFRAME | WS_EX_CLIENTEDGE | WS_EX_STATICEDGE | WS_EX_WINDOWEDGE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityState {
    Shown,
    Hidden,
    #[default]
    AsIs,
}

impl VisibilityState {
    /// Shown and Hidden swap; AsIs becomes Hidden.
    pub fn toggled(self) -> Self {
        match self {
            VisibilityState::Shown | VisibilityState::AsIs => VisibilityState::Hidden,
            VisibilityState::Hidden => VisibilityState::Shown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

/// Restorable placement of a window (normal-position rectangle plus show state).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowPlacement {
    pub rect: Rect,
    pub show_state: ShowState,
}

/// One instance of a managed native window on one workspace.
#[derive(Debug, Clone)]
pub struct Window {
    pub handle: WindowHandle,
    pub class_name: String,
    pub display_name: String,
    pub process_name: String,
    pub is_floating: bool,
    pub titlebar: VisibilityState,
    pub in_taskbar: VisibilityState,
    pub border: VisibilityState,
    pub workspaces_count: usize,
    pub is_minimized: bool,
    pub redraw_on_show: bool,
    pub hide_from_taskbar_when_inactive: bool,
    pub on_hidden_window_shown: OnWindowShownAction,
    original_style: u32,
    original_ex_style: u32,
    placement: Option<WindowPlacement>,
    original_placement: Option<WindowPlacement>,
    /// The window itself first, followed by the windows it owns.
    owned_windows: Vec<WindowHandle>,
}

impl Window {
    pub fn new(
        info: &NativeWindow,
        rule: &Rule,
        program_rule: &ProgramRule,
        workspaces_count: usize,
        is_minimized: bool,
        placement: Option<WindowPlacement>,
    ) -> Self {
        Self {
            handle: info.handle,
            class_name: info.class_name.clone(),
            display_name: info.title.clone(),
            process_name: info.process_name.clone(),
            is_floating: rule.is_floating,
            titlebar: rule.titlebar,
            in_taskbar: rule.in_taskbar,
            border: rule.border,
            workspaces_count,
            is_minimized,
            redraw_on_show: rule.redraw_on_show,
            hide_from_taskbar_when_inactive: rule.hide_from_taskbar_when_inactive,
            on_hidden_window_shown: program_rule.on_hidden_window_shown,
            original_style: info.style,
            original_ex_style: info.ex_style,
            placement,
            original_placement: placement,
            owned_windows: vec![info.handle],
        }
    }

    pub fn is_shared(&self) -> bool {
        self.workspaces_count > 1
    }

    pub fn is_managed(&self) -> bool {
        !self.is_floating && !self.is_minimized
    }

    pub fn owned_windows(&self) -> &[WindowHandle] {
        &self.owned_windows
    }

    pub fn add_owned_window(&mut self, handle: WindowHandle) {
        if !self.owned_windows.contains(&handle) {
            self.owned_windows.push(handle);
        }
    }

    /// Drops owned windows that no longer exist. The owner always stays.
    pub fn prune_owned_windows(&mut self, host: &Host) {
        let owner = self.handle;
        self.owned_windows
            .retain(|&h| h == owner || host.system.is_window(h));
    }

    pub fn titlebar_style(&self) -> u32 {
        self.original_style & style::WS_OVERLAPPEDWINDOW
    }

    pub fn border_style(&self) -> u32 {
        self.original_style & style::WS_SIZEBOX
    }

    pub fn border_ex_style(&self) -> u32 {
        self.original_ex_style & style::WS_EX_BORDER_MASK
    }

    /// Computes the style bits this window should carry given its override state.
    pub fn apply_overrides(&self, current_style: u32, current_ex_style: u32) -> (u32, u32) {
        let mut style = current_style;
        let mut ex_style = current_ex_style;

        match self.in_taskbar {
            VisibilityState::Shown => {
                ex_style = (ex_style | style::WS_EX_APPWINDOW) & !style::WS_EX_TOOLWINDOW;
            }
            VisibilityState::Hidden => {
                ex_style = (ex_style & !style::WS_EX_APPWINDOW) | style::WS_EX_TOOLWINDOW;
            }
            VisibilityState::AsIs => {}
        }

        match self.titlebar {
            VisibilityState::Shown => style |= self.titlebar_style(),
            VisibilityState::Hidden => style &= !self.titlebar_style(),
            VisibilityState::AsIs => {}
        }

        match self.border {
            VisibilityState::Shown => {
                style |= self.border_style();
                ex_style |= self.border_ex_style();
            }
            VisibilityState::Hidden => {
                style &= !self.border_style();
                ex_style &= !self.border_ex_style();
            }
            VisibilityState::AsIs => {}
        }

        (style, ex_style)
    }

    /// Applies titlebar, border and taskbar overrides to the native window.
    pub fn initialize(&self, host: &Host) {
        let Some((style, ex_style)) = host.system.styles(self.handle) else {
            return;
        };
        let (new_style, new_ex_style) = self.apply_overrides(style, ex_style);
        if new_style == style && new_ex_style == ex_style {
            return;
        }

        host.manipulator
            .set_styles(self.handle, new_style, new_ex_style);
        if (new_ex_style & style::WS_EX_APPWINDOW) != (ex_style & style::WS_EX_APPWINDOW) {
            host.manipulator
                .notify_taskbar(self.handle, self.in_taskbar == VisibilityState::Shown);
        }
        self.redraw(host);
    }

    pub fn toggle_titlebar(&mut self, host: &Host) {
        self.titlebar = self.titlebar.toggled();
        self.initialize(host);
    }

    pub fn toggle_border(&mut self, host: &Host) {
        self.border = self.border.toggled();
        self.initialize(host);
    }

    pub fn toggle_taskbar(&mut self, host: &Host) {
        self.in_taskbar = self.in_taskbar.toggled();
        self.show_in_taskbar(host, self.in_taskbar == VisibilityState::Shown);
    }

    pub fn show_in_taskbar(&self, host: &Host, show: bool) {
        let Some((style, ex_style)) = host.system.styles(self.handle) else {
            return;
        };
        let new_ex_style = if show {
            (ex_style | style::WS_EX_APPWINDOW) & !style::WS_EX_TOOLWINDOW
        } else {
            (ex_style & !style::WS_EX_APPWINDOW) | style::WS_EX_TOOLWINDOW
        };
        host.manipulator.set_styles(self.handle, style, new_ex_style);
        host.manipulator.notify_taskbar(self.handle, show);
    }

    pub fn redraw(&self, host: &Host) {
        if host.is_responsive(self.handle) {
            host.manipulator.redraw(self.handle);
        }
    }

    pub fn save_position(&mut self, host: &Host) {
        if let Some(placement) = host.system.window_placement(self.handle) {
            self.placement = Some(placement);
        }
    }

    pub fn restore_position(&self, host: &Host, show: bool) {
        if let Some(placement) = &self.placement {
            host.manipulator
                .set_window_placement(self.handle, placement, show);
        }
    }

    /// Shows the window together with its owned windows without activating them.
    pub fn show(&self, host: &Host) {
        if self.redraw_on_show {
            self.redraw(host);
        }
        for &h in &self.owned_windows {
            host.manipulator.show_window(h, ShowCommand::ShowNa);
        }
    }

    /// Shows the owned windows (not the owner itself) and redraws if asked to.
    /// Used after the owner was shown as part of a position batch.
    pub fn show_popups_and_redraw(&self, host: &Host) {
        for &h in self.owned_windows.iter().skip(1) {
            host.manipulator.show_window(h, ShowCommand::ShowNa);
        }
        if self.redraw_on_show {
            self.redraw(host);
        }
    }

    pub fn hide_popups(&self, host: &Host) {
        for &h in self.owned_windows.iter().skip(1) {
            host.manipulator.show_window(h, ShowCommand::Hide);
        }
    }

    pub fn hide(&self, host: &Host) {
        for &h in &self.owned_windows {
            host.manipulator.show_window(h, ShowCommand::Hide);
        }
    }

    pub fn revert_to_initial_values(&mut self, host: &Host) {
        self.titlebar = VisibilityState::Shown;
        self.in_taskbar = VisibilityState::Shown;
        self.border = VisibilityState::Shown;
        self.initialize(host);

        self.placement = self.original_placement;
        self.restore_position(host, true);
        self.show(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_window(style_bits: u32, ex_style_bits: u32) -> Window {
        let info = NativeWindow {
            handle: 1,
            class_name: "Notepad".to_string(),
            title: "Untitled - Notepad".to_string(),
            process_name: "notepad".to_string(),
            style: style_bits,
            ex_style: ex_style_bits,
            owner: None,
            has_parent: false,
            is_visible: true,
        };
        Window::new(&info, &Rule::default(), &ProgramRule::default(), 1, false, None)
    }

    #[test]
    fn test_visibility_toggle() {
        assert_eq!(VisibilityState::Shown.toggled(), VisibilityState::Hidden);
        assert_eq!(VisibilityState::Hidden.toggled(), VisibilityState::Shown);
        assert_eq!(VisibilityState::AsIs.toggled(), VisibilityState::Hidden);
    }

    #[test]
    fn test_titlebar_style_masks_original_bits() {
        let window = test_window(style::WS_OVERLAPPEDWINDOW | style::WS_VISIBLE, 0);
        assert_eq!(window.titlebar_style(), style::WS_OVERLAPPEDWINDOW);
        assert_eq!(window.border_style(), style::WS_SIZEBOX);
    }

    #[test]
    fn test_apply_overrides_hides_titlebar() {
        let mut window = test_window(style::WS_OVERLAPPEDWINDOW, style::WS_EX_WINDOWEDGE);
        window.titlebar = VisibilityState::Hidden;

        let (style_bits, ex_style_bits) =
            window.apply_overrides(style::WS_OVERLAPPEDWINDOW | style::WS_VISIBLE, 0);
        assert_eq!(style_bits, style::WS_VISIBLE);
        assert_eq!(ex_style_bits, 0);
    }

    #[test]
    fn test_apply_overrides_taskbar_hidden() {
        let mut window = test_window(0, style::WS_EX_APPWINDOW);
        window.in_taskbar = VisibilityState::Hidden;

        let (_, ex_style_bits) = window.apply_overrides(0, style::WS_EX_APPWINDOW);
        assert_eq!(ex_style_bits & style::WS_EX_APPWINDOW, 0);
        assert_ne!(ex_style_bits & style::WS_EX_TOOLWINDOW, 0);
    }

    #[test]
    fn test_apply_overrides_as_is_keeps_bits() {
        let window = test_window(style::WS_OVERLAPPEDWINDOW, style::WS_EX_CLIENTEDGE);
        let (style_bits, ex_style_bits) =
            window.apply_overrides(style::WS_CAPTION, style::WS_EX_CLIENTEDGE);
        assert_eq!(style_bits, style::WS_CAPTION);
        assert_eq!(ex_style_bits, style::WS_EX_CLIENTEDGE);
    }

    #[test]
    fn test_managed_predicate() {
        let mut window = test_window(0, 0);
        assert!(window.is_managed());
        window.is_floating = true;
        assert!(!window.is_managed());
        window.is_floating = false;
        window.is_minimized = true;
        assert!(!window.is_managed());
    }
}
