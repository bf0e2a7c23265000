use fusuma_ipc::LayoutKind;

use super::{Area, Layout};
use crate::core::{style, Rect, ShowState, Window, WindowPlacement};
use crate::platform::{Host, ShowCommand};

/// Every managed window maximized on the workspace's monitor.
#[derive(Debug, Default)]
pub struct FullScreenLayout;

impl FullScreenLayout {
    fn maximize(&self, host: &Host, window: &Window, area: Area) {
        if !host.is_responsive(window.handle) {
            return;
        }

        let window_monitor = host.system.monitor_for_window(window.handle);
        let on_other_monitor = window_monitor != Some(area.monitor);
        if on_other_monitor && host.system.is_zoomed(window.handle) {
            host.manipulator
                .show_window(window.handle, ShowCommand::ShowNoActivate);
            host.settle(host.timing.minimize_restore_delay());
        }

        let mut placement = host
            .system
            .window_placement(window.handle)
            .unwrap_or_default();
        let window_style = host
            .system
            .styles(window.handle)
            .map(|(s, _)| s)
            .unwrap_or(0);
        let maximizable = style::WS_CAPTION | style::WS_MAXIMIZEBOX;

        if window_style & maximizable == maximizable {
            if on_other_monitor {
                let from = window_monitor
                    .and_then(|i| host.system.monitors().into_iter().find(|m| m.index == i))
                    .map(|m| m.bounds);
                if let Some(from) = from {
                    placement.rect = translate(placement.rect, from, area.bounds);
                }
            }
            placement.show_state = ShowState::Maximized;
        } else {
            // Windows that cannot maximize are sized to the working area instead.
            placement = WindowPlacement {
                rect: Rect::new(
                    area.bounds.x,
                    area.bounds.y,
                    area.working_area.width,
                    area.working_area.height,
                ),
                show_state: ShowState::Normal,
            };
        }

        host.manipulator
            .set_window_placement(window.handle, &placement, true);
    }
}

/// Moves `rect` from monitor `from` to the same relative spot on `to`.
fn translate(rect: Rect, from: Rect, to: Rect) -> Rect {
    let left = rect.x + to.x - from.x;
    let top = rect.y + to.y - from.y;
    let right = rect.right() + to.right() - from.right();
    let bottom = rect.bottom() + to.bottom() - from.bottom();
    Rect::new(
        left,
        top,
        (right - left).max(0) as u32,
        (bottom - top).max(0) as u32,
    )
}

impl Layout for FullScreenLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::FullScreen
    }

    fn name(&self) -> &'static str {
        "Full Screen"
    }

    fn symbol(&self, window_count: usize) -> String {
        if window_count == 0 {
            "[M]".to_string()
        } else {
            format!("[{}]", window_count)
        }
    }

    fn should_save_and_restore_shared_window_position(&self) -> bool {
        false
    }

    fn reposition(&self, host: &Host, windows: &[&Window], area: Area) {
        for window in windows {
            self.maximize(host, window, area);
        }
    }

    fn window_created(
        &self,
        host: &Host,
        window: &Window,
        _windows: &[&Window],
        area: Area,
        relayout: bool,
    ) {
        if relayout {
            self.maximize(host, window, area);
        }
    }

    fn window_destroyed(&self, _: &Host, _: &Window, _: &[&Window], _: Area, _: bool) {}

    fn window_restored(
        &self,
        host: &Host,
        window: &Window,
        _windows: &[&Window],
        area: Area,
        relayout: bool,
    ) {
        if relayout {
            self.maximize(host, window, area);
        }
    }

    fn window_titlebar_toggled(&self, host: &Host, window: &Window, area: Area, relayout: bool) {
        if relayout {
            self.maximize(host, window, area);
        }
    }

    fn window_border_toggled(&self, host: &Host, window: &Window, area: Area, relayout: bool) {
        if relayout {
            self.maximize(host, window, area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProgramRule, Rule};
    use crate::platform::mock::*;
    use crate::platform::WindowSystem;

    fn area() -> Area {
        Area {
            monitor: 0,
            bounds: Rect::new(0, 0, 1920, 1080),
            working_area: Rect::new(0, 0, 1920, 1040),
        }
    }

    fn create_window(env: &TestEnv, handle: u64) -> Window {
        let info = env.system.window(handle).unwrap();
        Window::new(&info, &Rule::default(), &ProgramRule::default(), 1, false, None)
    }

    #[test]
    fn test_symbol() {
        assert_eq!(FullScreenLayout.symbol(0), "[M]");
        assert_eq!(FullScreenLayout.symbol(2), "[2]");
    }

    #[test]
    fn test_maximizes_each_window() {
        let env = TestEnv::new(MockWindowSystem::new().with_windows(vec![
            create_test_window(1, "A", "A", "a"),
            create_test_window(2, "B", "B", "b"),
        ]));
        let windows = [create_window(&env, 1), create_window(&env, 2)];
        let refs: Vec<&Window> = windows.iter().collect();

        FullScreenLayout.reposition(&env.host(), &refs, area());

        let placements: Vec<_> = env
            .manipulator
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ManipulatorCall::SetWindowPlacement(_, true)))
            .collect();
        assert_eq!(placements.len(), 2);
        assert!(env.manipulator.batches().is_empty());
    }

    #[test]
    fn test_restores_window_maximized_on_other_monitor() {
        let env = TestEnv::new(
            MockWindowSystem::new()
                .with_windows(vec![create_test_window(1, "A", "A", "a")])
                .with_monitors(vec![
                    create_test_monitor(0, 0, 0, 1920, 1080),
                    create_test_monitor(1, 1920, 0, 1920, 1080),
                ]),
        );
        env.system.set_monitor(1, 1);
        env.system.set_zoomed(1, true);
        let window = create_window(&env, 1);

        FullScreenLayout.reposition(&env.host(), &[&window], area());

        assert_eq!(
            env.manipulator.shown_commands(1),
            vec![ShowCommand::ShowNoActivate]
        );
        assert_eq!(env.system.total_slept(), env.timing.minimize_restore_delay());
    }

    #[test]
    fn test_translate_between_monitors() {
        let moved = translate(
            Rect::new(2000, 100, 800, 600),
            Rect::new(1920, 0, 1920, 1080),
            Rect::new(0, 0, 1920, 1080),
        );
        assert_eq!(moved, Rect::new(80, 100, 800, 600));
    }
}
