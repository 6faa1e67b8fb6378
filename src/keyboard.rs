use crate::error::{KeyflowError, Result};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

/// Keys whose down/up events drive the shift modifier.
pub const SHIFT_KEYS: [&str; 3] = ["shift", "left shift", "right shift"];
pub const CTRL_KEYS: [&str; 4] = ["ctrl", "control", "left ctrl", "right ctrl"];
pub const CAPS_LOCK_KEY: &str = "caps lock";
pub const BACKSPACE_KEY: &str = "backspace";
/// Pressed together with ctrl, flips the engine between enabled and disabled.
pub const TOGGLE_KEY: &str = "f12";

/// Named keys that produce a literal character.
pub const SPECIAL_KEYS: [(&str, char); 3] = [("space", ' '), ("enter", '\n'), ("tab", '\t')];

/// US layout symbol produced by each key while shift is held.
pub const SHIFTED_SYMBOLS: [(char, char); 21] = [
    ('1', '!'),
    ('2', '@'),
    ('3', '#'),
    ('4', '$'),
    ('5', '%'),
    ('6', '^'),
    ('7', '&'),
    ('8', '*'),
    ('9', '('),
    ('0', ')'),
    ('-', '_'),
    ('=', '+'),
    ('[', '{'),
    (']', '}'),
    (';', ':'),
    ('\'', '"'),
    (',', '<'),
    ('.', '>'),
    ('/', '?'),
    ('\\', '|'),
    ('`', '~'),
];

pub fn is_shift_key(name: &str) -> bool {
    SHIFT_KEYS.contains(&name)
}

pub fn is_ctrl_key(name: &str) -> bool {
    CTRL_KEYS.contains(&name)
}

fn shifted_symbol(c: char) -> Option<char> {
    SHIFTED_SYMBOLS
        .iter()
        .find(|(base, _)| *base == c)
        .map(|(_, shifted)| *shifted)
}

fn unshifted_symbol(c: char) -> Option<char> {
    SHIFTED_SYMBOLS
        .iter()
        .find(|(_, shifted)| *shifted == c)
        .map(|(base, _)| *base)
}

/// Resolve a key name plus modifier state to the character it types.
///
/// Letters follow `shift XOR caps lock`; shift also maps digits and
/// punctuation through [`SHIFTED_SYMBOLS`]. Multi-character names other than
/// space, enter and tab produce nothing.
pub fn resolve_key(name: &str, shift_active: bool, caps_lock_active: bool) -> Option<char> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_control() {
            return None;
        }
        if c.is_alphabetic() {
            let upper = shift_active ^ caps_lock_active;
            let resolved = if upper {
                c.to_uppercase().next()
            } else {
                c.to_lowercase().next()
            };
            return resolved.or(Some(c));
        }
        if shift_active {
            if let Some(shifted) = shifted_symbol(c) {
                return Some(shifted);
            }
        }
        return Some(c);
    }

    SPECIAL_KEYS
        .iter()
        .find(|(special, _)| *special == name)
        .map(|(_, c)| *c)
}

/// Name of the key a hook reports when `c` is typed, the inverse of
/// [`resolve_key`]. Characters with no key on a US layout give `None`.
pub fn key_name_for_char(c: char) -> Option<String> {
    if let Some((name, _)) = SPECIAL_KEYS.iter().find(|(_, special)| *special == c) {
        return Some(name.to_string());
    }
    if c.is_ascii_alphabetic() {
        return Some(c.to_ascii_lowercase().to_string());
    }
    if let Some(base) = unshifted_symbol(c) {
        return Some(base.to_string());
    }
    if c.is_ascii_graphic() {
        return Some(c.to_string());
    }
    None
}

/// Keys the engine sends on its own behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKey {
    Backspace,
    /// The platform paste chord (ctrl+v, cmd+v on macOS)
    Paste,
}

/// Keystroke injection used by the firing sequence.
pub trait KeySink {
    fn send(&mut self, key: NamedKey) -> Result<()>;

    /// Type `text` directly as simulated keystrokes.
    fn write(&mut self, text: &str) -> Result<()>;
}

/// Opens a [`KeySink`] for the duration of one fire.
pub trait KeyEmitter: Send {
    fn session(&mut self, fire: &mut dyn FnMut(&mut dyn KeySink) -> Result<()>) -> Result<()>;
}

/// Create a keyboard controller
pub fn create_keyboard_controller() -> Result<Enigo> {
    Enigo::new(&Settings::default()).map_err(|err| {
        KeyflowError::Enigo(format!("Failed to create keyboard controller: {}", err))
    })
}

fn click(keyboard: &mut Enigo, key: Key, direction: Direction) -> Result<()> {
    keyboard
        .key(key, direction)
        .map_err(|err| KeyflowError::Enigo(format!("Failed to send {:?}: {}", key, err)))
}

/// [`KeyEmitter`] backed by enigo.
///
/// The controller lives for one session only since enigo handles are not
/// `Send` on every platform.
#[derive(Debug, Default)]
pub struct EnigoEmitter;

impl KeyEmitter for EnigoEmitter {
    fn session(&mut self, fire: &mut dyn FnMut(&mut dyn KeySink) -> Result<()>) -> Result<()> {
        let mut sink = EnigoSink(create_keyboard_controller()?);
        fire(&mut sink)
    }
}

struct EnigoSink(Enigo);

impl KeySink for EnigoSink {
    fn send(&mut self, key: NamedKey) -> Result<()> {
        let keyboard = &mut self.0;
        match key {
            NamedKey::Backspace => click(keyboard, Key::Backspace, Direction::Click),
            NamedKey::Paste => {
                let modifier = paste_modifier();
                click(keyboard, modifier, Direction::Press)?;
                let pasted = click(keyboard, Key::Unicode('v'), Direction::Click);
                // Always release the modifier so it does not stay latched
                let released = click(keyboard, modifier, Direction::Release);
                pasted.and(released)
            }
        }
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.0
            .text(text)
            .map_err(|err| KeyflowError::Enigo(format!("Failed to type text: {}", err)))
    }
}

#[cfg(target_os = "macos")]
fn paste_modifier() -> Key {
    Key::Meta
}

#[cfg(not(target_os = "macos"))]
fn paste_modifier() -> Key {
    Key::Control
}
