//! Native notification sources. Every callback runs on the loop thread
//! while it sits in `GetMessageW`; they only translate and forward.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc;

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_NOREPEAT,
    VIRTUAL_KEY, VK_LCONTROL, VK_LMENU, VK_LSHIFT, VK_LWIN, VK_RCONTROL, VK_RMENU, VK_RSHIFT,
    VK_RWIN,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, CreateWindowExW, DefWindowProcW, DeregisterShellHookWindow, DestroyWindow,
    RegisterClassW, RegisterShellHookWindow, RegisterWindowMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, CHILDID_SELF, EVENT_OBJECT_DESTROY, EVENT_OBJECT_HIDE,
    EVENT_OBJECT_NAMECHANGE, EVENT_OBJECT_SHOW, EVENT_SYSTEM_FOREGROUND,
    EVENT_SYSTEM_MINIMIZEEND, EVENT_SYSTEM_MINIMIZESTART, HC_ACTION, HHOOK, HMENU,
    KBDLLHOOKSTRUCT, OBJID_WINDOW, WH_KEYBOARD_LL, WINEVENT_OUTOFCONTEXT,
    WINEVENT_SKIPOWNPROCESS, WM_APP, WM_DISPLAYCHANGE, WM_KEYDOWN, WM_SYSKEYDOWN, WNDCLASSW,
    WS_EX_TOOLWINDOW, WS_POPUP,
};

use super::from_hwnd;
use crate::app::LoopWaker;
use crate::core::WindowHandle;
use crate::event::NativeEvent;
use crate::shortcuts::{Chord, KeyCode, Modifiers};

/// Posted to the loop thread to make `GetMessageW` return.
pub const WM_WAKE: u32 = WM_APP;
/// AppBar notifications sent to dock windows.
pub const WM_DOCK_CALLBACK: u32 = WM_APP + 1;

const HSHELL_WINDOWCREATED: usize = 1;
const HSHELL_REDRAW: usize = 6;
const HSHELL_WINDOWREPLACED: usize = 13;
const HSHELL_WINDOWREPLACING: usize = 14;
const HSHELL_FLASH: usize = 0x8006;

const SHELL_HOOK_CLASS: PCWSTR = w!("FusumaShellHook");

type KeyHandler = Rc<dyn Fn(&Chord) -> bool>;

struct EventSink {
    tx: mpsc::Sender<NativeEvent>,
    waker: LoopWaker,
}

/// Half of a window replacement seen before its counterpart.
#[derive(Clone, Copy)]
enum Replacement {
    Old(WindowHandle),
    New(WindowHandle),
}

thread_local! {
    static EVENT_SINK: RefCell<Option<EventSink>> = const { RefCell::new(None) };
    static KEY_HANDLER: RefCell<Option<KeyHandler>> = const { RefCell::new(None) };
    static SHELL_MESSAGE: Cell<u32> = const { Cell::new(0) };
    static PENDING_REPLACEMENT: Cell<Option<Replacement>> = const { Cell::new(None) };
}

/// Forwards a native notification to the loop and wakes it.
pub fn post_event(event: NativeEvent) {
    EVENT_SINK.with(|sink| {
        if let Some(sink) = sink.borrow().as_ref() {
            if sink.tx.send(event).is_ok() {
                (sink.waker)();
            }
        }
    });
}

/// Keeps native events flowing into `tx` until dropped.
pub struct EventSinkGuard;

pub fn install_event_sink(tx: mpsc::Sender<NativeEvent>, waker: LoopWaker) -> EventSinkGuard {
    EVENT_SINK.with(|sink| *sink.borrow_mut() = Some(EventSink { tx, waker }));
    EventSinkGuard
}

impl Drop for EventSinkGuard {
    fn drop(&mut self) {
        EVENT_SINK.with(|sink| *sink.borrow_mut() = None);
    }
}

pub struct KeyHandlerGuard;

/// `handler` decides whether an observed chord is swallowed.
pub fn install_key_handler(handler: impl Fn(&Chord) -> bool + 'static) -> KeyHandlerGuard {
    KEY_HANDLER.with(|h| *h.borrow_mut() = Some(Rc::new(handler)));
    KeyHandlerGuard
}

impl Drop for KeyHandlerGuard {
    fn drop(&mut self) {
        KEY_HANDLER.with(|h| *h.borrow_mut() = None);
    }
}

pub struct WinEventHooks(Vec<HWINEVENTHOOK>);

impl WinEventHooks {
    pub fn install() -> anyhow::Result<Self> {
        let ranges = [
            (EVENT_SYSTEM_FOREGROUND, EVENT_SYSTEM_FOREGROUND),
            (EVENT_SYSTEM_MINIMIZESTART, EVENT_SYSTEM_MINIMIZEEND),
            (EVENT_OBJECT_DESTROY, EVENT_OBJECT_HIDE),
            (EVENT_OBJECT_NAMECHANGE, EVENT_OBJECT_NAMECHANGE),
        ];
        let mut hooks = Vec::with_capacity(ranges.len());
        for (min, max) in ranges {
            let hook = unsafe {
                SetWinEventHook(
                    min,
                    max,
                    None,
                    Some(win_event_proc),
                    0,
                    0,
                    WINEVENT_OUTOFCONTEXT | WINEVENT_SKIPOWNPROCESS,
                )
            };
            if hook.is_invalid() {
                anyhow::bail!("SetWinEventHook failed for events {:#x}..{:#x}", min, max);
            }
            hooks.push(hook);
        }
        tracing::debug!("Installed {} WinEvent hooks", hooks.len());
        Ok(Self(hooks))
    }
}

impl Drop for WinEventHooks {
    fn drop(&mut self) {
        for hook in self.0.drain(..) {
            unsafe {
                let _ = UnhookWinEvent(hook);
            }
        }
    }
}

unsafe extern "system" fn win_event_proc(
    _hook: HWINEVENTHOOK,
    event: u32,
    hwnd: HWND,
    id_object: i32,
    id_child: i32,
    _thread: u32,
    _time: u32,
) {
    if event == EVENT_SYSTEM_FOREGROUND {
        post_event(NativeEvent::WindowActivated(from_hwnd(hwnd)));
        return;
    }
    if id_object != OBJID_WINDOW.0 || id_child != CHILDID_SELF as i32 {
        return;
    }
    let Some(handle) = from_hwnd(hwnd) else {
        return;
    };
    let native = match event {
        EVENT_OBJECT_DESTROY => NativeEvent::WindowDestroyed(handle),
        EVENT_OBJECT_SHOW => NativeEvent::WindowShown(handle),
        EVENT_OBJECT_HIDE => NativeEvent::WindowHidden(handle),
        EVENT_SYSTEM_MINIMIZESTART => NativeEvent::MinimizeStart(handle),
        EVENT_SYSTEM_MINIMIZEEND => NativeEvent::MinimizeEnd(handle),
        EVENT_OBJECT_NAMECHANGE => NativeEvent::TitleChanged(handle),
        _ => return,
    };
    post_event(native);
}

/// Hidden top-level window receiving shell hook messages and display changes.
pub struct ShellHookWindow(HWND);

impl ShellHookWindow {
    pub fn create() -> anyhow::Result<Self> {
        let instance: HINSTANCE = unsafe { GetModuleHandleW(None) }?.into();
        let class = WNDCLASSW {
            lpfnWndProc: Some(shell_hook_proc),
            hInstance: instance,
            lpszClassName: SHELL_HOOK_CLASS,
            ..Default::default()
        };
        if unsafe { RegisterClassW(&class) } == 0 {
            anyhow::bail!("Failed to register the shell hook window class");
        }
        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_TOOLWINDOW,
                SHELL_HOOK_CLASS,
                w!("fusuma"),
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
        }?;

        let message = unsafe { RegisterWindowMessageW(w!("SHELLHOOK")) };
        SHELL_MESSAGE.with(|m| m.set(message));
        if !unsafe { RegisterShellHookWindow(hwnd) }.as_bool() {
            unsafe {
                let _ = DestroyWindow(hwnd);
            }
            anyhow::bail!("RegisterShellHookWindow failed");
        }
        Ok(Self(hwnd))
    }
}

impl Drop for ShellHookWindow {
    fn drop(&mut self) {
        unsafe {
            let _ = DeregisterShellHookWindow(self.0);
            let _ = DestroyWindow(self.0);
        }
    }
}

unsafe extern "system" fn shell_hook_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_DISPLAYCHANGE {
        post_event(NativeEvent::DisplaySettingsChanged);
    } else if msg != 0 && msg == SHELL_MESSAGE.with(|m| m.get()) {
        if let Some(handle) = from_hwnd(HWND(lparam.0 as *mut _)) {
            shell_event(wparam.0, handle);
        }
        return LRESULT(0);
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

fn shell_event(code: usize, handle: WindowHandle) {
    match code {
        HSHELL_WINDOWCREATED => post_event(NativeEvent::WindowCreated(handle)),
        HSHELL_FLASH => post_event(NativeEvent::WindowFlashing(handle)),
        HSHELL_REDRAW => post_event(NativeEvent::IconChanged(handle)),
        HSHELL_WINDOWREPLACED => pair_replacement(Replacement::Old(handle)),
        HSHELL_WINDOWREPLACING => pair_replacement(Replacement::New(handle)),
        _ => {}
    }
}

/// The two halves of a replacement arrive as separate messages in either order.
fn pair_replacement(half: Replacement) {
    let pending = PENDING_REPLACEMENT.with(|p| p.take());
    match (pending, half) {
        (Some(Replacement::Old(old)), Replacement::New(new))
        | (Some(Replacement::New(new)), Replacement::Old(old)) => {
            post_event(NativeEvent::WindowReplaced { old, new });
        }
        (stale, half) => {
            match stale {
                Some(Replacement::New(new)) => post_event(NativeEvent::WindowCreated(new)),
                Some(Replacement::Old(old)) => post_event(NativeEvent::WindowDestroyed(old)),
                None => {}
            }
            PENDING_REPLACEMENT.with(|p| p.set(Some(half)));
        }
    }
}

/// Low-level keyboard hook, needed only for side-specific chords.
pub struct KeyboardHook(HHOOK);

impl KeyboardHook {
    pub fn install() -> anyhow::Result<Self> {
        let instance: HINSTANCE = unsafe { GetModuleHandleW(None) }?.into();
        let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), instance, 0) }?;
        tracing::info!("Keyboard hook installed");
        Ok(Self(hook))
    }
}

impl Drop for KeyboardHook {
    fn drop(&mut self) {
        unsafe {
            let _ = UnhookWindowsHookEx(self.0);
        }
        tracing::info!("Keyboard hook removed");
    }
}

const MODIFIER_KEYS: [(VIRTUAL_KEY, Modifiers); 8] = [
    (VK_LCONTROL, Modifiers::L_CONTROL),
    (VK_RCONTROL, Modifiers::R_CONTROL),
    (VK_LSHIFT, Modifiers::L_SHIFT),
    (VK_RSHIFT, Modifiers::R_SHIFT),
    (VK_LMENU, Modifiers::L_ALT),
    (VK_RMENU, Modifiers::R_ALT),
    (VK_LWIN, Modifiers::L_WIN),
    (VK_RWIN, Modifiers::R_WIN),
];

fn pressed_modifiers() -> Modifiers {
    MODIFIER_KEYS
        .iter()
        .filter(|(vk, _)| unsafe { GetAsyncKeyState(vk.0 as i32) } as u16 & 0x8000 != 0)
        .fold(Modifiers::NONE, |mods, (_, m)| mods | *m)
}

fn is_modifier_key(key: KeyCode) -> bool {
    // VK_SHIFT, VK_CONTROL and VK_MENU plus their side-specific codes
    matches!(key, 0x10..=0x12 | 0xA0..=0xA5 | 0x5B | 0x5C)
}

fn handle_key(chord: &Chord) -> bool {
    let handler = KEY_HANDLER.with(|h| h.borrow().clone());
    handler.is_some_and(|handler| handler(chord))
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        let message = wparam.0 as u32;
        if message == WM_KEYDOWN || message == WM_SYSKEYDOWN {
            let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            let key = info.vkCode as KeyCode;
            if !is_modifier_key(key) && handle_key(&Chord::new(key, pressed_modifiers())) {
                return LRESULT(1);
            }
        }
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

/// OS-level hotkeys for chords that do not care about modifier sides.
/// `WM_HOTKEY` is posted to the registering thread.
pub struct HotkeyRegistration(Vec<i32>);

impl HotkeyRegistration {
    pub fn register(chords: &[Chord]) -> Self {
        let mut ids = Vec::with_capacity(chords.len());
        for (i, chord) in chords.iter().enumerate() {
            let id = i as i32 + 1;
            let flags = HOT_KEY_MODIFIERS(chord.modifiers.to_hotkey_flags()) | MOD_NOREPEAT;
            match unsafe { RegisterHotKey(HWND::default(), id, flags, chord.key as u32) } {
                Ok(()) => ids.push(id),
                Err(e) => tracing::warn!(
                    "Failed to register hotkey {}: {}",
                    crate::shortcuts::format_chord(chord),
                    e
                ),
            }
        }
        tracing::info!("Registered {} hotkeys", ids.len());
        Self(ids)
    }
}

impl Drop for HotkeyRegistration {
    fn drop(&mut self) {
        for id in self.0.drain(..) {
            unsafe {
                let _ = UnregisterHotKey(HWND::default(), id);
            }
        }
    }
}

/// Chord reported by a `WM_HOTKEY` message.
pub fn hotkey_chord(lparam: LPARAM) -> Chord {
    let flags = (lparam.0 & 0xFFFF) as u32;
    let key = ((lparam.0 >> 16) & 0xFFFF) as KeyCode;
    Chord::new(key, Modifiers::from_hotkey_flags(flags))
}
