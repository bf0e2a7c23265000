use std::path::Path;
use std::time::Duration;

use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, HANDLE, HWND, LPARAM, RECT, TRUE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, MonitorFromWindow, HDC, HMONITOR, MONITORINFO,
    MONITORINFOEXW, MONITORINFOF_PRIMARY, MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SYNCHRONIZE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetAncestor, GetClassNameW, GetDesktopWindow, GetForegroundWindow,
    GetShellWindow, GetWindow, GetWindowLongW, GetWindowPlacement, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, IsZoomed,
    SendMessageTimeoutW, WaitForInputIdle, GA_PARENT, GWL_EXSTYLE, GWL_STYLE, GW_OWNER,
    SMTO_ABORTIFHUNG, SW_SHOWMAXIMIZED, SW_SHOWMINIMIZED, WINDOWPLACEMENT, WM_NULL,
};

use super::{from_hwnd, from_wide, to_hwnd, to_rect};
use crate::core::{ShowState, WindowHandle, WindowPlacement};
use crate::platform::{MonitorInfo, NativeWindow, WindowSystem};

pub struct Win32WindowSystem;

impl Win32WindowSystem {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSystem for Win32WindowSystem {
    fn window(&self, handle: WindowHandle) -> Option<NativeWindow> {
        let hwnd = to_hwnd(handle);
        if !unsafe { IsWindow(hwnd) }.as_bool() {
            return None;
        }
        let (style, ex_style) = self.styles(handle)?;
        let has_parent = unsafe { GetAncestor(hwnd, GA_PARENT) != GetDesktopWindow() };
        Some(NativeWindow {
            handle,
            class_name: class_name(hwnd),
            title: window_text(hwnd),
            process_name: process_name(hwnd).unwrap_or_default(),
            style,
            ex_style,
            owner: owner(hwnd),
            has_parent,
            is_visible: unsafe { IsWindowVisible(hwnd) }.as_bool(),
        })
    }

    fn styles(&self, handle: WindowHandle) -> Option<(u32, u32)> {
        let hwnd = to_hwnd(handle);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return None;
            }
            Some((
                GetWindowLongW(hwnd, GWL_STYLE) as u32,
                GetWindowLongW(hwnd, GWL_EXSTYLE) as u32,
            ))
        }
    }

    fn top_level_windows(&self) -> Vec<WindowHandle> {
        enum_windows().into_iter().filter_map(from_hwnd).collect()
    }

    fn owned_windows(&self, owner_handle: WindowHandle) -> Vec<WindowHandle> {
        enum_windows()
            .into_iter()
            .filter(|&hwnd| from_hwnd(hwnd) != Some(owner_handle))
            .filter(|&hwnd| unsafe {
                IsWindowVisible(hwnd).as_bool() && GetAncestor(hwnd, GA_PARENT) == GetDesktopWindow()
            })
            .filter(|&hwnd| {
                let mut current = owner(hwnd);
                while let Some(h) = current {
                    if h == owner_handle {
                        return true;
                    }
                    current = owner(to_hwnd(h));
                }
                false
            })
            .filter_map(from_hwnd)
            .collect()
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        unsafe { IsWindow(to_hwnd(handle)) }.as_bool()
    }

    fn is_visible(&self, handle: WindowHandle) -> bool {
        unsafe { IsWindowVisible(to_hwnd(handle)) }.as_bool()
    }

    fn is_iconic(&self, handle: WindowHandle) -> bool {
        unsafe { IsIconic(to_hwnd(handle)) }.as_bool()
    }

    fn is_zoomed(&self, handle: WindowHandle) -> bool {
        unsafe { IsZoomed(to_hwnd(handle)) }.as_bool()
    }

    fn is_responsive(&self, handle: WindowHandle, timeout: Duration) -> bool {
        let result = unsafe {
            SendMessageTimeoutW(
                to_hwnd(handle),
                WM_NULL,
                WPARAM(0),
                LPARAM(0),
                SMTO_ABORTIFHUNG,
                timeout.as_millis() as u32,
                None,
            )
        };
        result.0 != 0
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        from_hwnd(unsafe { GetForegroundWindow() })
    }

    fn shell_window(&self) -> Option<WindowHandle> {
        from_hwnd(unsafe { GetShellWindow() })
    }

    fn window_placement(&self, handle: WindowHandle) -> Option<WindowPlacement> {
        let mut placement = WINDOWPLACEMENT {
            length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
            ..Default::default()
        };
        unsafe { GetWindowPlacement(to_hwnd(handle), &mut placement) }.ok()?;
        let show_state = if placement.showCmd == SW_SHOWMINIMIZED.0 as u32 {
            ShowState::Minimized
        } else if placement.showCmd == SW_SHOWMAXIMIZED.0 as u32 {
            ShowState::Maximized
        } else {
            ShowState::Normal
        };
        Some(WindowPlacement {
            rect: to_rect(&placement.rcNormalPosition),
            show_state,
        })
    }

    fn monitor_for_window(&self, handle: WindowHandle) -> Option<usize> {
        let monitor = unsafe { MonitorFromWindow(to_hwnd(handle), MONITOR_DEFAULTTONEAREST) };
        enum_monitors().iter().position(|m| m.0 == monitor.0)
    }

    fn monitors(&self) -> Vec<MonitorInfo> {
        enum_monitors()
            .into_iter()
            .enumerate()
            .filter_map(|(index, monitor)| monitor_info(index, monitor))
            .collect()
    }

    fn wait_for_input_idle(&self, handle: WindowHandle, timeout: Duration) -> bool {
        let Some(process) = open_process(to_hwnd(handle), true) else {
            return false;
        };
        let result = unsafe { WaitForInputIdle(process, timeout.as_millis() as u32) };
        unsafe {
            let _ = CloseHandle(process);
        }
        result == 0
    }
}

fn enum_windows() -> Vec<HWND> {
    unsafe extern "system" fn collect(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let windows = &mut *(lparam.0 as *mut Vec<HWND>);
        windows.push(hwnd);
        TRUE
    }

    let mut windows: Vec<HWND> = Vec::new();
    let result = unsafe {
        EnumWindows(
            Some(collect),
            LPARAM(&mut windows as *mut Vec<HWND> as isize),
        )
    };
    if let Err(e) = result {
        tracing::warn!("EnumWindows failed: {}", e);
    }
    windows
}

fn enum_monitors() -> Vec<HMONITOR> {
    unsafe extern "system" fn collect(
        monitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let monitors = &mut *(lparam.0 as *mut Vec<HMONITOR>);
        monitors.push(monitor);
        TRUE
    }

    let mut monitors: Vec<HMONITOR> = Vec::new();
    unsafe {
        let _ = EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(collect),
            LPARAM(&mut monitors as *mut Vec<HMONITOR> as isize),
        );
    }
    monitors
}

fn monitor_info(index: usize, monitor: HMONITOR) -> Option<MonitorInfo> {
    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;
    let ok = unsafe {
        GetMonitorInfoW(monitor, &mut info as *mut MONITORINFOEXW as *mut MONITORINFO)
    };
    if !ok.as_bool() {
        tracing::warn!("GetMonitorInfoW failed for monitor {}", index);
        return None;
    }
    Some(MonitorInfo {
        index,
        name: from_wide(&info.szDevice),
        bounds: to_rect(&info.monitorInfo.rcMonitor),
        working_area: to_rect(&info.monitorInfo.rcWork),
        is_primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
    })
}

fn owner(hwnd: HWND) -> Option<WindowHandle> {
    unsafe { GetWindow(hwnd, GW_OWNER) }.ok().and_then(from_hwnd)
}

fn class_name(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    from_wide(&buf[..len.max(0) as usize])
}

fn window_text(hwnd: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    from_wide(&buf[..len.max(0) as usize])
}

fn open_process(hwnd: HWND, synchronize: bool) -> Option<HANDLE> {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    if pid == 0 {
        return None;
    }
    let access = if synchronize {
        PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_SYNCHRONIZE
    } else {
        PROCESS_QUERY_LIMITED_INFORMATION
    };
    unsafe { OpenProcess(access, false, pid) }.ok()
}

/// Executable name without directory or extension, e.g. `firefox`.
fn process_name(hwnd: HWND) -> Option<String> {
    let process = open_process(hwnd, false)?;
    let mut buf = [0u16; 1024];
    let mut size = buf.len() as u32;
    let result = unsafe {
        QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            PWSTR(buf.as_mut_ptr()),
            &mut size,
        )
    };
    unsafe {
        let _ = CloseHandle(process);
    }
    result.ok()?;

    let path = String::from_utf16_lossy(&buf[..size as usize]);
    Path::new(&path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}
