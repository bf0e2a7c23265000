use fusuma_ipc::LayoutKind;
use serde::{Deserialize, Serialize};

use super::{Area, Layout};
use crate::core::{Rect, Window};
use crate::platform::{Host, PositionBatch, PositionFlags, ShowCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutAxis {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
    Monocle,
}

impl LayoutAxis {
    const ALL: [LayoutAxis; 5] = [
        LayoutAxis::LeftToRight,
        LayoutAxis::RightToLeft,
        LayoutAxis::TopToBottom,
        LayoutAxis::BottomToTop,
        LayoutAxis::Monocle,
    ];

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&a| a == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "left-to-right" | "ltr" => Some(LayoutAxis::LeftToRight),
            "right-to-left" | "rtl" => Some(LayoutAxis::RightToLeft),
            "top-to-bottom" | "ttb" => Some(LayoutAxis::TopToBottom),
            "bottom-to-top" | "btt" => Some(LayoutAxis::BottomToTop),
            "monocle" => Some(LayoutAxis::Monocle),
            _ => None,
        }
    }

    fn area_symbol(self, count: usize) -> String {
        match self {
            LayoutAxis::LeftToRight | LayoutAxis::RightToLeft => "|".to_string(),
            LayoutAxis::TopToBottom | LayoutAxis::BottomToTop => "=".to_string(),
            LayoutAxis::Monocle => count.to_string(),
        }
    }
}

/// Master/stack tiling.
///
/// The layout axis splits the working area into a master area and a stack
/// area; each area is then subdivided equally along its own axis. A
/// `Monocle` area axis stacks every window of the area on the same rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayout {
    pub layout_axis: LayoutAxis,
    pub master_axis: LayoutAxis,
    pub stack_axis: LayoutAxis,
    master_factor: f64,
    master_count: usize,
}

impl Default for TileLayout {
    fn default() -> Self {
        Self::new(
            LayoutAxis::LeftToRight,
            LayoutAxis::Monocle,
            LayoutAxis::TopToBottom,
            0.6,
            1,
        )
    }
}

impl TileLayout {
    pub fn new(
        layout_axis: LayoutAxis,
        master_axis: LayoutAxis,
        stack_axis: LayoutAxis,
        master_factor: f64,
        master_count: usize,
    ) -> Self {
        Self {
            layout_axis,
            master_axis,
            stack_axis,
            master_factor: master_factor.clamp(0.0, 1.0),
            master_count,
        }
    }

    pub fn master_factor(&self) -> f64 {
        self.master_factor
    }

    pub fn master_count(&self) -> usize {
        self.master_count
    }

    pub fn add_to_master_count(&mut self, delta: i64) {
        self.master_count = (self.master_count as i64 + delta).max(0) as usize;
    }

    pub fn add_to_master_factor(&mut self, delta: f64) {
        self.master_factor = (self.master_factor + delta).clamp(0.0, 1.0);
    }

    /// Rectangles for `window_count` windows in tiling order: master area first.
    pub fn generate_layout(&self, window_count: usize, area: Rect) -> Vec<Rect> {
        let master = self.master_count.min(window_count);
        let stack = window_count - master;

        let mut rects = Vec::with_capacity(window_count);
        self.position_area(master, stack, true, area, &mut rects);
        self.position_area(stack, master, false, area, &mut rects);
        rects
    }

    fn position_area(
        &self,
        count: usize,
        other_count: usize,
        master: bool,
        area: Rect,
        rects: &mut Vec<Rect>,
    ) {
        if count == 0 {
            return;
        }

        let factor = if other_count == 0 {
            1.0
        } else if master {
            self.master_factor
        } else {
            1.0 - self.master_factor
        };
        let axis = if master {
            self.master_axis
        } else {
            self.stack_axis
        };

        let mut width = area.width as i32;
        let mut height = area.height as i32;
        let mut x = area.x;
        let mut y = area.y;

        match self.layout_axis {
            LayoutAxis::LeftToRight => {
                width = (width as f64 * factor) as i32;
                x = if master { area.x } else { area.right() - width };
            }
            LayoutAxis::RightToLeft => {
                width = (width as f64 * factor) as i32;
                x = if master { area.right() - width } else { area.x };
            }
            LayoutAxis::TopToBottom => {
                height = (height as f64 * factor) as i32;
                y = if master { area.y } else { area.bottom() - height };
            }
            LayoutAxis::BottomToTop => {
                height = (height as f64 * factor) as i32;
                y = if master { area.bottom() - height } else { area.y };
            }
            LayoutAxis::Monocle => {}
        }

        // Reverse axes start flush with the far edge of the area.
        let n = count as i32;
        match axis {
            LayoutAxis::LeftToRight => width /= n,
            LayoutAxis::RightToLeft => {
                x += width;
                width /= n;
                x -= width;
            }
            LayoutAxis::TopToBottom => height /= n,
            LayoutAxis::BottomToTop => {
                y += height;
                height /= n;
                y -= height;
            }
            LayoutAxis::Monocle => {}
        }

        for _ in 0..count {
            rects.push(Rect::new(x, y, width.max(0) as u32, height.max(0) as u32));
            match axis {
                LayoutAxis::LeftToRight => x += width,
                LayoutAxis::RightToLeft => x -= width,
                LayoutAxis::TopToBottom => y += height,
                LayoutAxis::BottomToTop => y -= height,
                LayoutAxis::Monocle => {}
            }
        }
    }

    /// Restores maximized windows without activating them, then lets them settle.
    fn restore_maximized<'w>(&self, host: &Host, windows: impl IntoIterator<Item = &'w Window>) {
        let mut restored = false;
        for window in windows {
            if host.system.is_zoomed(window.handle) {
                host.manipulator
                    .show_window(window.handle, ShowCommand::ShowNoActivate);
                restored = true;
            }
        }
        if restored {
            host.settle(host.timing.minimize_restore_delay());
        }
    }

    fn parse_axis(args: &[String]) -> Result<LayoutAxis, String> {
        args.first()
            .and_then(|s| LayoutAxis::parse(s))
            .ok_or_else(|| {
                "usage: <left-to-right|right-to-left|top-to-bottom|bottom-to-top|monocle>"
                    .to_string()
            })
    }

    fn set_axis(slot: &mut LayoutAxis, axis: LayoutAxis) -> bool {
        if *slot == axis {
            return false;
        }
        *slot = axis;
        true
    }
}

impl Layout for TileLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Tile
    }

    fn name(&self) -> &'static str {
        "Tile"
    }

    fn symbol(&self, window_count: usize) -> String {
        if self.layout_axis == LayoutAxis::Monocle {
            return format!("[{}]", window_count);
        }

        let master_windows = self.master_count.min(window_count);
        let stack_windows = window_count - master_windows;

        let stack = self.stack_axis.area_symbol(stack_windows);
        let master = if self.master_count > 1 {
            Some(self.master_axis.area_symbol(master_windows))
        } else {
            None
        };

        match (self.layout_axis, master) {
            (LayoutAxis::LeftToRight | LayoutAxis::TopToBottom, None) => format!("[]{}", stack),
            (LayoutAxis::LeftToRight | LayoutAxis::TopToBottom, Some(m)) => {
                format!("{}]{}", m, stack)
            }
            (_, None) => format!("{}[]", stack),
            (_, Some(m)) => format!("{}[{}", stack, m),
        }
    }

    fn should_save_and_restore_shared_window_position(&self) -> bool {
        false
    }

    fn reposition(&self, host: &Host, windows: &[&Window], area: Area) {
        if windows.is_empty() {
            return;
        }

        self.restore_maximized(host, windows.iter().copied());

        let rects = self.generate_layout(windows.len(), area.working_area);
        let mut batch = PositionBatch::begin(windows.len());
        for (window, rect) in windows.iter().zip(rects) {
            if host.is_responsive(window.handle) {
                batch.defer(window.handle, Some(rect), PositionFlags::reposition());
            }
        }
        host.manipulator.commit(&batch);
    }

    fn window_created(
        &self,
        host: &Host,
        window: &Window,
        windows: &[&Window],
        area: Area,
        relayout: bool,
    ) {
        if relayout || !window.is_shared() {
            self.restore_maximized(host, [window]);
            if relayout {
                self.reposition(host, windows, area);
            }
        }
    }

    fn window_minimized(
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

    fn window_restored(
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

    fn command(&mut self, cmd: &str, args: &[String]) -> Result<bool, String> {
        let number = |default: f64| -> Result<f64, String> {
            match args.first() {
                Some(s) => s
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number: {}", s)),
                None => Ok(default),
            }
        };

        match cmd {
            "inc-master-count" => {
                self.add_to_master_count(number(1.0)? as i64);
                Ok(true)
            }
            "dec-master-count" => {
                self.add_to_master_count(-(number(1.0)? as i64));
                Ok(true)
            }
            "set-master-count" => {
                let count = args
                    .first()
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| "usage: set-master-count <count>".to_string())?;
                self.master_count = count;
                Ok(true)
            }
            "inc-master-factor" => {
                self.add_to_master_factor(number(0.05)?);
                Ok(true)
            }
            "dec-master-factor" => {
                self.add_to_master_factor(-number(0.05)?);
                Ok(true)
            }
            "set-master-factor" => {
                let factor = args
                    .first()
                    .and_then(|s| s.parse::<f64>().ok())
                    .filter(|f| (0.0..=1.0).contains(f))
                    .ok_or_else(|| "invalid factor (must be 0.0-1.0)".to_string())?;
                self.master_factor = factor;
                Ok(true)
            }
            "toggle-layout-axis" => {
                self.layout_axis = self.layout_axis.next();
                Ok(true)
            }
            "toggle-master-axis" => {
                self.master_axis = self.master_axis.next();
                Ok(true)
            }
            "toggle-stack-axis" => {
                self.stack_axis = self.stack_axis.next();
                Ok(true)
            }
            "set-layout-axis" => Ok(Self::set_axis(
                &mut self.layout_axis,
                Self::parse_axis(args)?,
            )),
            "set-master-axis" => Ok(Self::set_axis(
                &mut self.master_axis,
                Self::parse_axis(args)?,
            )),
            "set-stack-axis" => Ok(Self::set_axis(
                &mut self.stack_axis,
                Self::parse_axis(args)?,
            )),
            _ => Err(format!("unknown command: {}", cmd)),
        }
    }
}
