//! Native backend: window queries, window manipulation, hooks and the
//! message loop the daemon runs on.

mod event_loop;
mod hooks;
mod manipulator;
mod system;

use std::ffi::c_void;

use windows::Win32::Foundation::{HWND, RECT};

use crate::core::{Rect, WindowHandle};

pub use event_loop::run;

pub(crate) fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle as usize as *mut c_void)
}

/// `None` for the null window.
pub(crate) fn from_hwnd(hwnd: HWND) -> Option<WindowHandle> {
    if hwnd.0.is_null() {
        None
    } else {
        Some(hwnd.0 as usize as WindowHandle)
    }
}

pub(crate) fn to_rect(rc: &RECT) -> Rect {
    Rect::new(
        rc.left,
        rc.top,
        (rc.right - rc.left).max(0) as u32,
        (rc.bottom - rc.top).max(0) as u32,
    )
}

pub(crate) fn to_native_rect(rect: &Rect) -> RECT {
    RECT {
        left: rect.x,
        top: rect.y,
        right: rect.right(),
        bottom: rect.bottom(),
    }
}

pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

pub(crate) fn from_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}
