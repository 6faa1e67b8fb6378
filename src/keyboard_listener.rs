use crate::engine::{KeyEvent, KeyEventKind};
use crate::error::{KeyflowError, Result};
use rdev::{self, EventType, Key as RdevKey};

/// Sink the hook pushes translated events into, one at a time.
pub type EventHandler = Box<dyn FnMut(KeyEvent) + Send>;

/// A source of raw keyboard events.
///
/// `run` owns the subscription for its whole lifetime and only returns when
/// the subscription ends or could not be installed.
pub trait KeyboardHook: Send + 'static {
    fn run(self, handler: EventHandler) -> Result<()>;
}

/// Global keyboard hook backed by `rdev::listen`.
#[derive(Debug, Default)]
pub struct RdevHook;

impl KeyboardHook for RdevHook {
    fn run(self, mut handler: EventHandler) -> Result<()> {
        rdev::listen(move |event| {
            if let Some(key_event) = translate_event(&event) {
                handler(key_event);
            }
        })
        .map_err(|e| KeyflowError::Hook(format!("{:?}", e)))
    }
}

/// Convert an rdev event into a named key event; mouse and wheel events are dropped.
pub fn translate_event(event: &rdev::Event) -> Option<KeyEvent> {
    match event.event_type {
        EventType::KeyPress(key) => Some(KeyEvent::new(KeyEventKind::Down, rdev_key_name(key))),
        EventType::KeyRelease(key) => Some(KeyEvent::new(KeyEventKind::Up, rdev_key_name(key))),
        _ => None,
    }
}

/// Layout-independent name for a physical key.
///
/// Printable keys are named by their unshifted US character so that shift
/// and caps lock are applied by the resolver, not by the OS.
pub fn rdev_key_name(key: RdevKey) -> String {
    let name = match key {
        RdevKey::KeyA => "a",
        RdevKey::KeyB => "b",
        RdevKey::KeyC => "c",
        RdevKey::KeyD => "d",
        RdevKey::KeyE => "e",
        RdevKey::KeyF => "f",
        RdevKey::KeyG => "g",
        RdevKey::KeyH => "h",
        RdevKey::KeyI => "i",
        RdevKey::KeyJ => "j",
        RdevKey::KeyK => "k",
        RdevKey::KeyL => "l",
        RdevKey::KeyM => "m",
        RdevKey::KeyN => "n",
        RdevKey::KeyO => "o",
        RdevKey::KeyP => "p",
        RdevKey::KeyQ => "q",
        RdevKey::KeyR => "r",
        RdevKey::KeyS => "s",
        RdevKey::KeyT => "t",
        RdevKey::KeyU => "u",
        RdevKey::KeyV => "v",
        RdevKey::KeyW => "w",
        RdevKey::KeyX => "x",
        RdevKey::KeyY => "y",
        RdevKey::KeyZ => "z",
        RdevKey::Num0 | RdevKey::Kp0 => "0",
        RdevKey::Num1 | RdevKey::Kp1 => "1",
        RdevKey::Num2 | RdevKey::Kp2 => "2",
        RdevKey::Num3 | RdevKey::Kp3 => "3",
        RdevKey::Num4 | RdevKey::Kp4 => "4",
        RdevKey::Num5 | RdevKey::Kp5 => "5",
        RdevKey::Num6 | RdevKey::Kp6 => "6",
        RdevKey::Num7 | RdevKey::Kp7 => "7",
        RdevKey::Num8 | RdevKey::Kp8 => "8",
        RdevKey::Num9 | RdevKey::Kp9 => "9",
        RdevKey::Minus => "-",
        RdevKey::Equal => "=",
        RdevKey::LeftBracket => "[",
        RdevKey::RightBracket => "]",
        RdevKey::SemiColon => ";",
        RdevKey::Quote => "'",
        RdevKey::BackQuote => "`",
        RdevKey::BackSlash | RdevKey::IntlBackslash => "\\",
        RdevKey::Comma => ",",
        RdevKey::Dot => ".",
        RdevKey::Slash => "/",
        RdevKey::Space => "space",
        RdevKey::Return | RdevKey::KpReturn => "enter",
        RdevKey::Tab => "tab",
        RdevKey::Backspace => "backspace",
        RdevKey::ShiftLeft => "left shift",
        RdevKey::ShiftRight => "right shift",
        RdevKey::CapsLock => "caps lock",
        RdevKey::ControlLeft | RdevKey::ControlRight => "ctrl",
        RdevKey::Alt => "alt",
        RdevKey::AltGr => "alt gr",
        RdevKey::MetaLeft | RdevKey::MetaRight => "windows",
        RdevKey::LeftArrow => "left",
        RdevKey::RightArrow => "right",
        RdevKey::UpArrow => "up",
        RdevKey::DownArrow => "down",
        RdevKey::Escape => "esc",
        RdevKey::Delete | RdevKey::KpDelete => "delete",
        other => return format!("{:?}", other).to_lowercase(),
    };
    name.to_string()
}
