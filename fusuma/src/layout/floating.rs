use fusuma_ipc::LayoutKind;

use super::{Area, Layout};
use crate::core::Window;
use crate::platform::Host;

/// Leaves geometry to the user.
#[derive(Debug, Default)]
pub struct FloatingLayout;

impl Layout for FloatingLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Floating
    }

    fn name(&self) -> &'static str {
        "Floating"
    }

    fn symbol(&self, _window_count: usize) -> String {
        "><>".to_string()
    }

    fn should_save_and_restore_shared_window_position(&self) -> bool {
        true
    }

    fn reposition(&self, _host: &Host, _windows: &[&Window], _area: Area) {}

    fn window_created(&self, _: &Host, _: &Window, _: &[&Window], _: Area, _: bool) {}

    fn window_destroyed(&self, _: &Host, _: &Window, _: &[&Window], _: Area, _: bool) {}
}
