use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PostThreadMessageW, TranslateMessage, MSG, WM_HOTKEY,
};

use super::hooks::{
    self, HotkeyRegistration, KeyboardHook, ShellHookWindow, WinEventHooks, WM_WAKE,
};
use super::manipulator::Win32WindowManipulator;
use super::system::Win32WindowSystem;
use crate::app::{self, App, LoopControl, LoopWaker};
use crate::core::Config;
use crate::event_emitter::EventEmitter;
use crate::platform::Host;

/// Runs the daemon on the calling thread until a quit command arrives.
pub fn run(config: Config) -> Result<()> {
    unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
        .ok()
        .context("Failed to initialize COM")?;
    let result = run_main_loop(config);
    unsafe { CoUninitialize() };
    result
}

fn run_main_loop(config: Config) -> Result<()> {
    let thread_id = unsafe { GetCurrentThreadId() };
    let waker: LoopWaker = Arc::new(move || unsafe {
        let _ = PostThreadMessageW(thread_id, WM_WAKE, WPARAM(0), LPARAM(0));
    });

    let (tokio_channels, main_channels) = app::create_channels(waker.clone());

    // Spawn tokio runtime in separate thread
    std::thread::spawn(move || match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(app::run_async(tokio_channels)),
        Err(e) => tracing::error!("Failed to start tokio runtime: {}", e),
    });

    let system = Win32WindowSystem::new();
    let manipulator = Win32WindowManipulator::new();
    let events = EventEmitter::new(main_channels.state_event_tx.clone());
    let timing = config.timing.clone();
    let host = Host::new(&system, &manipulator, &events, &timing);

    let native_event_tx = main_channels.native_event_tx.clone();
    let app = Rc::new(RefCell::new(App::new(&config, &host, main_channels)?));

    let _event_sink = hooks::install_event_sink(native_event_tx, waker.clone());
    let _win_events = WinEventHooks::install()?;
    let _shell_hook = ShellHookWindow::create()?;

    let weak = Rc::downgrade(&app);
    let key_waker = waker.clone();
    let _key_handler = hooks::install_key_handler(move |chord| {
        let Some(app) = weak.upgrade() else {
            return false;
        };
        // Busy means we were re-entered from inside a command; let the key through
        let handled = match app.try_borrow() {
            Ok(app) => app.handle_key(chord),
            Err(_) => false,
        };
        if handled {
            key_waker();
        }
        handled
    });

    app.borrow_mut().start(&host);

    tracing::info!("Starting main loop");
    let mut keyboard_hook: Option<KeyboardHook> = None;
    let mut hotkeys: Option<HotkeyRegistration> = None;
    let mut msg = MSG::default();

    loop {
        if app.borrow_mut().take_hotkeys_changed() {
            let app = app.borrow();
            let dispatcher = app.hotkeys().dispatcher();
            // Unregister before registering the new set
            drop(hotkeys.take());
            hotkeys = Some(HotkeyRegistration::register(&dispatcher.generic_chords()));
            keyboard_hook = match (dispatcher.needs_keyboard_hook(), keyboard_hook.take()) {
                (true, Some(hook)) => Some(hook),
                (true, None) => Some(KeyboardHook::install()?),
                (false, _) => None,
            };
        }

        let ret = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
        if ret.0 == 0 {
            break;
        }
        if ret.0 < 0 {
            tracing::error!("GetMessageW failed");
            break;
        }

        if msg.hwnd.0.is_null() && msg.message == WM_HOTKEY {
            let chord = hooks::hotkey_chord(msg.lParam);
            let handled = app.borrow().handle_key(&chord);
            tracing::trace!("Hotkey {:?} handled: {}", chord, handled);
        } else if !msg.hwnd.0.is_null() {
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        if app.borrow_mut().process_pending(&host) == LoopControl::Quit {
            break;
        }
    }

    drop(keyboard_hook);
    drop(hotkeys);
    app.borrow_mut().shutdown(&host);
    tracing::info!("Main loop exited");
    Ok(())
}
