use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::os::windows::process::CommandExt;

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    RedrawWindow, HRGN, RDW_ALLCHILDREN, RDW_ERASE, RDW_FRAME, RDW_INVALIDATE, RDW_UPDATENOW,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_INPROC_SERVER};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    ITaskbarList, SHAppBarMessage, TaskbarList, ABE_BOTTOM, ABE_TOP, ABM_NEW, ABM_QUERYPOS,
    ABM_REMOVE, ABM_SETPOS, ABN_FULLSCREENAPP, ABN_POSCHANGED, APPBARDATA,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BeginDeferWindowPos, CreateWindowExW, DefWindowProcW, DeferWindowPos, DestroyWindow,
    EndDeferWindowPos, GetWindowLongPtrW, PostMessageW, RegisterClassW, SetForegroundWindow,
    SetWindowLongPtrW, SetWindowLongW, SetWindowPlacement, SetWindowPos, ShowWindow, GWLP_USERDATA,
    GWL_EXSTYLE, GWL_STYLE, HMENU, HWND_BOTTOM, HWND_NOTOPMOST, HWND_TOP, HWND_TOPMOST,
    SET_WINDOW_POS_FLAGS, SHOW_WINDOW_CMD, SWP_FRAMECHANGED, SWP_HIDEWINDOW, SWP_NOACTIVATE,
    SWP_NOMOVE, SWP_NOOWNERZORDER, SWP_NOSIZE, SWP_NOZORDER, SWP_SHOWWINDOW, SW_HIDE,
    SW_MAXIMIZE, SW_MINIMIZE, SW_RESTORE, SW_SHOWMAXIMIZED, SW_SHOWMINNOACTIVE, SW_SHOWNA,
    SW_SHOWNOACTIVATE, WINDOWPLACEMENT, WM_CLOSE, WNDCLASSW, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_POPUP,
};

use super::hooks::{post_event, WM_DOCK_CALLBACK};
use super::{from_hwnd, to_hwnd, to_native_rect, to_rect};
use crate::core::{Rect, ShowState, WindowHandle, WindowPlacement};
use crate::event::NativeEvent;
use crate::platform::{
    DeferredPosition, DockEdge, MonitorInfo, PositionBatch, ShowCommand, WindowManipulator, ZOrder,
};

const DOCK_CLASS: PCWSTR = w!("FusumaDock");
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub struct Win32WindowManipulator {
    taskbar: RefCell<Option<ITaskbarList>>,
    dock_class: Cell<Option<HINSTANCE>>,
    /// Docks currently holding an AppBar reservation.
    reserved: RefCell<HashSet<WindowHandle>>,
}

impl Win32WindowManipulator {
    pub fn new() -> Self {
        Self {
            taskbar: RefCell::new(None),
            dock_class: Cell::new(None),
            reserved: RefCell::new(HashSet::new()),
        }
    }

    fn taskbar(&self) -> Option<ITaskbarList> {
        let mut cached = self.taskbar.borrow_mut();
        if cached.is_none() {
            let list: ITaskbarList =
                match unsafe { CoCreateInstance(&TaskbarList, None, CLSCTX_INPROC_SERVER) } {
                    Ok(list) => list,
                    Err(e) => {
                        tracing::warn!("Cannot create taskbar list: {}", e);
                        return None;
                    }
                };
            if let Err(e) = unsafe { list.HrInit() } {
                tracing::warn!("Cannot initialize taskbar list: {}", e);
                return None;
            }
            *cached = Some(list);
        }
        cached.clone()
    }

    fn dock_instance(&self) -> Option<HINSTANCE> {
        if let Some(instance) = self.dock_class.get() {
            return Some(instance);
        }
        let instance: HINSTANCE = match unsafe { GetModuleHandleW(None) } {
            Ok(module) => module.into(),
            Err(e) => {
                tracing::warn!("GetModuleHandleW failed: {}", e);
                return None;
            }
        };
        let class = WNDCLASSW {
            lpfnWndProc: Some(dock_proc),
            hInstance: instance,
            lpszClassName: DOCK_CLASS,
            ..Default::default()
        };
        if unsafe { RegisterClassW(&class) } == 0 {
            tracing::warn!("Failed to register the dock window class");
            return None;
        }
        self.dock_class.set(Some(instance));
        Some(instance)
    }

    fn reserve(&self, hwnd: HWND, handle: WindowHandle) {
        if self.reserved.borrow_mut().insert(handle) {
            let mut data = appbar_data(hwnd);
            data.uCallbackMessage = WM_DOCK_CALLBACK;
            unsafe { SHAppBarMessage(ABM_NEW, &mut data) };
        }
    }
}

impl WindowManipulator for Win32WindowManipulator {
    fn commit(&self, batch: &PositionBatch) {
        if batch.is_empty() {
            return;
        }
        let deferred = unsafe { BeginDeferWindowPos(batch.len() as i32) }.and_then(|mut hdwp| {
            for entry in batch.entries() {
                let (insert_after, flags) = native_flags(entry);
                let (x, y, cx, cy) = coordinates(entry.rect);
                hdwp = unsafe {
                    DeferWindowPos(hdwp, to_hwnd(entry.handle), insert_after, x, y, cx, cy, flags)
                }?;
            }
            unsafe { EndDeferWindowPos(hdwp) }
        });

        if let Err(e) = deferred {
            tracing::debug!("Deferred positioning failed ({}), placing one by one", e);
            for entry in batch.entries() {
                let (insert_after, flags) = native_flags(entry);
                let (x, y, cx, cy) = coordinates(entry.rect);
                if let Err(e) = unsafe {
                    SetWindowPos(to_hwnd(entry.handle), insert_after, x, y, cx, cy, flags)
                } {
                    tracing::debug!("SetWindowPos failed for window {}: {}", entry.handle, e);
                }
            }
        }
    }

    fn show_window(&self, handle: WindowHandle, cmd: ShowCommand) {
        unsafe {
            let _ = ShowWindow(to_hwnd(handle), show_command(cmd));
        }
    }

    fn set_styles(&self, handle: WindowHandle, style: u32, ex_style: u32) {
        let hwnd = to_hwnd(handle);
        unsafe {
            SetWindowLongW(hwnd, GWL_STYLE, style as i32);
            SetWindowLongW(hwnd, GWL_EXSTYLE, ex_style as i32);
        }
    }

    fn redraw(&self, handle: WindowHandle) {
        unsafe {
            let _ = RedrawWindow(
                to_hwnd(handle),
                None,
                HRGN::default(),
                RDW_ERASE | RDW_FRAME | RDW_INVALIDATE | RDW_ALLCHILDREN,
            );
        }
    }

    fn redraw_desktop(&self) {
        unsafe {
            let _ = RedrawWindow(
                HWND::default(),
                None,
                HRGN::default(),
                RDW_ALLCHILDREN | RDW_ERASE | RDW_INVALIDATE | RDW_UPDATENOW,
            );
        }
    }

    fn set_window_placement(&self, handle: WindowHandle, placement: &WindowPlacement, show: bool) {
        let show_cmd = if !show {
            SW_HIDE
        } else {
            match placement.show_state {
                ShowState::Normal => SW_SHOWNOACTIVATE,
                ShowState::Minimized => SW_SHOWMINNOACTIVE,
                ShowState::Maximized => SW_SHOWMAXIMIZED,
            }
        };
        let native = WINDOWPLACEMENT {
            length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
            showCmd: show_cmd.0 as u32,
            rcNormalPosition: to_native_rect(&placement.rect),
            ..Default::default()
        };
        if let Err(e) = unsafe { SetWindowPlacement(to_hwnd(handle), &native) } {
            tracing::debug!("SetWindowPlacement failed for window {}: {}", handle, e);
        }
    }

    fn set_foreground(&self, handle: WindowHandle) {
        if !unsafe { SetForegroundWindow(to_hwnd(handle)) }.as_bool() {
            tracing::debug!("SetForegroundWindow refused for window {}", handle);
        }
    }

    fn close_window(&self, handle: WindowHandle) {
        if let Err(e) = unsafe { PostMessageW(to_hwnd(handle), WM_CLOSE, WPARAM(0), LPARAM(0)) } {
            tracing::debug!("Failed to close window {}: {}", handle, e);
        }
    }

    fn exec_command(&self, command: &str) -> Result<(), String> {
        tracing::info!("Executing: {}", command);
        std::process::Command::new("cmd")
            .arg("/C")
            .arg(command)
            .creation_flags(CREATE_NO_WINDOW)
            .spawn()
            .map(|_| ())
            .map_err(|e| format!("Failed to run '{}': {}", command, e))
    }

    fn notify_taskbar(&self, handle: WindowHandle, show: bool) {
        let Some(taskbar) = self.taskbar() else {
            return;
        };
        let hwnd = to_hwnd(handle);
        let result = unsafe {
            if show {
                taskbar.AddTab(hwnd)
            } else {
                taskbar.DeleteTab(hwnd)
            }
        };
        if let Err(e) = result {
            tracing::debug!("Taskbar update failed for window {}: {}", handle, e);
        }
    }

    fn create_dock(&self, monitor: usize, edge: DockEdge, height: u32) -> Option<WindowHandle> {
        let instance = self.dock_instance()?;
        let hwnd = match unsafe {
            CreateWindowExW(
                WS_EX_TOOLWINDOW | WS_EX_TOPMOST,
                DOCK_CLASS,
                w!(""),
                WS_POPUP,
                0,
                0,
                0,
                0,
                HWND::default(),
                HMENU::default(),
                instance,
                None,
            )
        } {
            Ok(hwnd) => hwnd,
            Err(e) => {
                tracing::warn!("Failed to create dock on monitor {}: {}", monitor, e);
                return None;
            }
        };
        unsafe { SetWindowLongPtrW(hwnd, GWLP_USERDATA, monitor as isize) };
        tracing::debug!(
            "Created {:?} dock of height {} on monitor {}",
            edge,
            height,
            monitor
        );
        from_hwnd(hwnd)
    }

    fn set_dock_position(
        &self,
        dock: WindowHandle,
        monitor: &MonitorInfo,
        edge: DockEdge,
        height: u32,
    ) -> Rect {
        let hwnd = to_hwnd(dock);
        self.reserve(hwnd, dock);

        let mut data = appbar_data(hwnd);
        data.uEdge = match edge {
            DockEdge::Top => ABE_TOP,
            DockEdge::Bottom => ABE_BOTTOM,
        };
        data.rc = to_native_rect(&monitor.bounds);
        fit_to_edge(&mut data, edge, height);
        unsafe { SHAppBarMessage(ABM_QUERYPOS, &mut data) };
        fit_to_edge(&mut data, edge, height);
        unsafe { SHAppBarMessage(ABM_SETPOS, &mut data) };

        to_rect(&data.rc)
    }

    fn release_dock(&self, dock: WindowHandle) {
        if self.reserved.borrow_mut().remove(&dock) {
            let mut data = appbar_data(to_hwnd(dock));
            unsafe { SHAppBarMessage(ABM_REMOVE, &mut data) };
        }
    }

    fn destroy_dock(&self, dock: WindowHandle) {
        self.release_dock(dock);
        if let Err(e) = unsafe { DestroyWindow(to_hwnd(dock)) } {
            tracing::debug!("Failed to destroy dock {}: {}", dock, e);
        }
    }
}

fn show_command(cmd: ShowCommand) -> SHOW_WINDOW_CMD {
    match cmd {
        ShowCommand::Hide => SW_HIDE,
        ShowCommand::ShowNoActivate => SW_SHOWNOACTIVATE,
        ShowCommand::ShowNa => SW_SHOWNA,
        ShowCommand::Minimize => SW_MINIMIZE,
        ShowCommand::ShowMinNoActive => SW_SHOWMINNOACTIVE,
        ShowCommand::Restore => SW_RESTORE,
        ShowCommand::Maximize => SW_MAXIMIZE,
    }
}

fn native_flags(entry: &DeferredPosition) -> (HWND, SET_WINDOW_POS_FLAGS) {
    let mut flags = SET_WINDOW_POS_FLAGS(0);
    if entry.rect.is_none() {
        flags |= SWP_NOMOVE | SWP_NOSIZE;
    }
    if entry.flags.show {
        flags |= SWP_SHOWWINDOW;
    }
    if entry.flags.hide {
        flags |= SWP_HIDEWINDOW;
    }
    if !entry.flags.activate {
        flags |= SWP_NOACTIVATE;
    }
    if entry.flags.frame_changed {
        flags |= SWP_FRAMECHANGED;
    }
    let insert_after = match entry.flags.z_order {
        ZOrder::Unchanged => {
            flags |= SWP_NOZORDER | SWP_NOOWNERZORDER;
            HWND::default()
        }
        ZOrder::Top => HWND_TOP,
        ZOrder::Bottom => HWND_BOTTOM,
        ZOrder::Topmost => HWND_TOPMOST,
        ZOrder::NoTopmost => HWND_NOTOPMOST,
        ZOrder::After(handle) => to_hwnd(handle),
    };
    (insert_after, flags)
}

fn coordinates(rect: Option<Rect>) -> (i32, i32, i32, i32) {
    match rect {
        Some(r) => (r.x, r.y, r.width as i32, r.height as i32),
        None => (0, 0, 0, 0),
    }
}

fn appbar_data(hwnd: HWND) -> APPBARDATA {
    APPBARDATA {
        cbSize: std::mem::size_of::<APPBARDATA>() as u32,
        hWnd: hwnd,
        ..Default::default()
    }
}

fn fit_to_edge(data: &mut APPBARDATA, edge: DockEdge, height: u32) {
    match edge {
        DockEdge::Top => data.rc.bottom = data.rc.top + height as i32,
        DockEdge::Bottom => data.rc.top = data.rc.bottom - height as i32,
    }
}

unsafe extern "system" fn dock_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if msg == WM_DOCK_CALLBACK {
        let monitor = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as usize;
        match wparam.0 as u32 {
            ABN_FULLSCREENAPP => post_event(if lparam.0 != 0 {
                NativeEvent::FullScreenOpened { monitor }
            } else {
                NativeEvent::FullScreenClosed { monitor }
            }),
            ABN_POSCHANGED => {
                if let Some(dock) = from_hwnd(hwnd) {
                    post_event(NativeEvent::DockPositionChanged(dock));
                }
            }
            _ => {}
        }
        return LRESULT(0);
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}
