use std::sync::mpsc;

use fusuma_ipc::Command;

/// Virtual-key code of the non-modifier key of a chord.
pub type KeyCode = u16;

/// Side-specific modifier flags. A family (Control, Shift, Alt, Win) with
/// both sides set stands for "either side".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const L_CONTROL: Modifiers = Modifiers(0x01);
    pub const R_CONTROL: Modifiers = Modifiers(0x02);
    pub const L_SHIFT: Modifiers = Modifiers(0x04);
    pub const R_SHIFT: Modifiers = Modifiers(0x08);
    pub const L_ALT: Modifiers = Modifiers(0x10);
    pub const R_ALT: Modifiers = Modifiers(0x20);
    pub const L_WIN: Modifiers = Modifiers(0x40);
    pub const R_WIN: Modifiers = Modifiers(0x80);

    pub const CONTROL: Modifiers = Modifiers(0x03);
    pub const SHIFT: Modifiers = Modifiers(0x0C);
    pub const ALT: Modifiers = Modifiers(0x30);
    pub const WIN: Modifiers = Modifiers(0xC0);

    const FAMILIES: [Modifiers; 4] = [Self::CONTROL, Self::SHIFT, Self::ALT, Self::WIN];

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Modifiers) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// For every family used by either side, the two sides must share a bit.
    pub fn overlaps(self, observed: Modifiers) -> bool {
        Self::FAMILIES.iter().all(|&family| {
            let ours = self.0 & family.0;
            let theirs = observed.0 & family.0;
            (ours | theirs) == 0 || ours & theirs != 0
        })
    }

    /// Every family is either unused or used on both sides, which is what
    /// OS-level hotkey registration can express.
    pub fn is_generic(self) -> bool {
        Self::FAMILIES.iter().all(|&family| {
            let bits = self.0 & family.0;
            bits == 0 || bits == family.0
        })
    }
}

// RegisterHotKey modifier flags
const MOD_ALT: u32 = 0x0001;
const MOD_CONTROL: u32 = 0x0002;
const MOD_SHIFT: u32 = 0x0004;
const MOD_WIN: u32 = 0x0008;

const HOTKEY_FLAGS: [(Modifiers, u32); 4] = [
    (Modifiers::CONTROL, MOD_CONTROL),
    (Modifiers::SHIFT, MOD_SHIFT),
    (Modifiers::ALT, MOD_ALT),
    (Modifiers::WIN, MOD_WIN),
];

impl Modifiers {
    /// Flags for registering an OS hotkey. Any bit of a family selects it.
    pub fn to_hotkey_flags(self) -> u32 {
        HOTKEY_FLAGS
            .iter()
            .filter(|(family, _)| self.intersects(*family))
            .fold(0, |flags, (_, flag)| flags | flag)
    }

    /// Generic modifiers reported by a `WM_HOTKEY` message.
    pub fn from_hotkey_flags(flags: u32) -> Modifiers {
        HOTKEY_FLAGS
            .iter()
            .filter(|(_, flag)| flags & flag != 0)
            .fold(Modifiers::NONE, |mods, (family, _)| mods | *family)
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub key: KeyCode,
    pub modifiers: Modifiers,
}

impl Chord {
    pub fn new(key: KeyCode, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Whether this subscription chord fires for an observed key press.
    pub fn matches(&self, observed: &Chord) -> bool {
        self.key == observed.key && self.modifiers.overlaps(observed.modifiers)
    }
}

pub fn parse_chord(chord: &str) -> Result<Chord, String> {
    let parts: Vec<&str> = chord.split('-').collect();
    let Some((key_part, modifier_parts)) = parts.split_last() else {
        return Err("Empty key string".to_string());
    };
    if key_part.is_empty() {
        return Err(format!("Missing key in '{}'", chord));
    }

    let mut modifiers = Modifiers::NONE;
    for part in modifier_parts {
        let flag = match part.to_lowercase().as_str() {
            "ctrl" | "control" => Modifiers::CONTROL,
            "lctrl" | "lcontrol" => Modifiers::L_CONTROL,
            "rctrl" | "rcontrol" => Modifiers::R_CONTROL,
            "shift" => Modifiers::SHIFT,
            "lshift" => Modifiers::L_SHIFT,
            "rshift" => Modifiers::R_SHIFT,
            "alt" => Modifiers::ALT,
            "lalt" => Modifiers::L_ALT,
            "ralt" => Modifiers::R_ALT,
            "win" | "super" => Modifiers::WIN,
            "lwin" => Modifiers::L_WIN,
            "rwin" => Modifiers::R_WIN,
            _ => return Err(format!("Unknown modifier: {}", part)),
        };
        modifiers.insert(flag);
    }

    Ok(Chord {
        key: parse_key_code(key_part)?,
        modifiers,
    })
}

pub fn format_chord(chord: &Chord) -> String {
    let names = [
        (Modifiers::CONTROL, "ctrl", "lctrl", "rctrl"),
        (Modifiers::SHIFT, "shift", "lshift", "rshift"),
        (Modifiers::ALT, "alt", "lalt", "ralt"),
        (Modifiers::WIN, "win", "lwin", "rwin"),
    ];
    let mut parts: Vec<String> = Vec::new();
    for (family, both, left, right) in names {
        let bits = Modifiers(chord.modifiers.bits() & family.bits());
        if bits == family {
            parts.push(both.to_string());
        } else if bits.intersects(Modifiers(family.bits() & 0x55)) {
            parts.push(left.to_string());
        } else if !bits.is_empty() {
            parts.push(right.to_string());
        }
    }
    parts.push(key_code_to_str(chord.key));
    parts.join("-")
}

pub type Handler = Box<dyn Fn() -> bool>;

/// Ordered chord subscriptions. Handlers run in registration order and the
/// first one returning true stops the key press from propagating.
#[derive(Default)]
pub struct ShortcutDispatcher {
    subscriptions: Vec<(Chord, Handler)>,
}

impl ShortcutDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, chord: Chord, handler: Handler) {
        self.subscriptions.push((chord, handler));
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns true when the key press was consumed.
    pub fn dispatch(&self, observed: &Chord) -> bool {
        self.subscriptions
            .iter()
            .filter(|(chord, _)| chord.matches(observed))
            .any(|(_, handler)| handler())
    }

    /// Subscribed chords that can be registered as OS hotkeys.
    pub fn generic_chords(&self) -> Vec<Chord> {
        let mut chords: Vec<Chord> = Vec::new();
        for (chord, _) in &self.subscriptions {
            if chord.modifiers.is_generic() && !chords.contains(chord) {
                chords.push(*chord);
            }
        }
        chords
    }

    /// Whether some subscription needs the low-level keyboard hook.
    pub fn needs_keyboard_hook(&self) -> bool {
        self.subscriptions
            .iter()
            .any(|(chord, _)| !chord.modifiers.is_generic())
    }
}

/// Key bindings from config and the `bind` command. Bound commands are
/// posted to the main loop, never run from inside a hook.
pub struct HotkeyManager {
    bindings: Vec<(Chord, Command)>,
    command_tx: mpsc::Sender<Command>,
    dispatcher: ShortcutDispatcher,
    changed: bool,
}

impl HotkeyManager {
    pub fn new(command_tx: mpsc::Sender<Command>) -> Self {
        Self {
            bindings: Vec::new(),
            command_tx,
            dispatcher: ShortcutDispatcher::new(),
            changed: false,
        }
    }

    pub fn bind(&mut self, key_str: &str, command: Command) -> Result<(), String> {
        let chord = parse_chord(key_str)?;
        tracing::info!("Binding {} to {:?}", key_str, command);
        match self.bindings.iter_mut().find(|(c, _)| *c == chord) {
            Some(binding) => binding.1 = command,
            None => self.bindings.push((chord, command)),
        }
        self.rebuild();
        Ok(())
    }

    pub fn unbind(&mut self, key_str: &str) -> Result<(), String> {
        let chord = parse_chord(key_str)?;
        let before = self.bindings.len();
        self.bindings.retain(|(c, _)| *c != chord);
        if self.bindings.len() == before {
            return Err(format!("No binding for {}", key_str));
        }
        tracing::info!("Unbound {}", key_str);
        self.rebuild();
        Ok(())
    }

    pub fn list_bindings(&self) -> Vec<(String, Command)> {
        self.bindings
            .iter()
            .map(|(chord, cmd)| (format_chord(chord), cmd.clone()))
            .collect()
    }

    pub fn dispatch(&self, observed: &Chord) -> bool {
        self.dispatcher.dispatch(observed)
    }

    pub fn dispatcher(&self) -> &ShortcutDispatcher {
        &self.dispatcher
    }

    /// Reports a binding change once, so the hook owner can re-register.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn rebuild(&mut self) {
        self.dispatcher.clear();
        for (chord, command) in &self.bindings {
            let tx = self.command_tx.clone();
            let command = command.clone();
            self.dispatcher.subscribe(
                *chord,
                Box::new(move || {
                    if tx.send(command.clone()).is_err() {
                        tracing::error!("Failed to send command from hotkey");
                        return false;
                    }
                    true
                }),
            );
        }
        self.changed = true;
    }
}

fn parse_key_code(key: &str) -> Result<KeyCode, String> {
    let lower = key.to_lowercase();
    let bytes = lower.as_bytes();
    if bytes.len() == 1 && (bytes[0].is_ascii_lowercase() || bytes[0].is_ascii_digit()) {
        return Ok(bytes[0].to_ascii_uppercase() as KeyCode);
    }
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u16>().ok()) {
        if (1..=24).contains(&n) {
            return Ok(0x70 + n - 1);
        }
    }
    match lower.as_str() {
        "return" | "enter" => Ok(0x0D),
        "tab" => Ok(0x09),
        "space" => Ok(0x20),
        "backspace" | "back" => Ok(0x08),
        "delete" | "del" => Ok(0x2E),
        "insert" | "ins" => Ok(0x2D),
        "escape" | "esc" => Ok(0x1B),
        "home" => Ok(0x24),
        "end" => Ok(0x23),
        "pageup" => Ok(0x21),
        "pagedown" => Ok(0x22),
        "left" => Ok(0x25),
        "up" => Ok(0x26),
        "right" => Ok(0x27),
        "down" => Ok(0x28),
        "semicolon" => Ok(0xBA),
        "equal" => Ok(0xBB),
        "comma" => Ok(0xBC),
        "minus" => Ok(0xBD),
        "period" => Ok(0xBE),
        "slash" => Ok(0xBF),
        "grave" => Ok(0xC0),
        "leftbracket" => Ok(0xDB),
        "backslash" => Ok(0xDC),
        "rightbracket" => Ok(0xDD),
        "quote" => Ok(0xDE),
        _ => Err(format!("Unknown key: {}", key)),
    }
}

fn key_code_to_str(code: KeyCode) -> String {
    match code {
        0x30..=0x39 | 0x41..=0x5A => ((code as u8) as char).to_ascii_lowercase().to_string(),
        0x70..=0x87 => format!("f{}", code - 0x70 + 1),
        0x0D => "enter".to_string(),
        0x09 => "tab".to_string(),
        0x20 => "space".to_string(),
        0x08 => "backspace".to_string(),
        0x2E => "delete".to_string(),
        0x2D => "insert".to_string(),
        0x1B => "escape".to_string(),
        0x24 => "home".to_string(),
        0x23 => "end".to_string(),
        0x21 => "pageup".to_string(),
        0x22 => "pagedown".to_string(),
        0x25 => "left".to_string(),
        0x26 => "up".to_string(),
        0x27 => "right".to_string(),
        0x28 => "down".to_string(),
        0xBA => "semicolon".to_string(),
        0xBB => "equal".to_string(),
        0xBC => "comma".to_string(),
        0xBD => "minus".to_string(),
        0xBE => "period".to_string(),
        0xBF => "slash".to_string(),
        0xC0 => "grave".to_string(),
        0xDB => "leftbracket".to_string(),
        0xDC => "backslash".to_string(),
        0xDD => "rightbracket".to_string(),
        0xDE => "quote".to_string(),
        _ => format!("0x{:02x}", code),
    }
}
