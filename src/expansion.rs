use crate::clipboard::ClipboardAccess;
use crate::error::Result;
use crate::keyboard::{key_name_for_char, KeyEmitter, KeySink, NamedKey, BACKSPACE_KEY};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

/// How long after a fire the hook may still report the engine's own keystrokes.
pub const ECHO_WINDOW: Duration = Duration::from_millis(500);

/// A completed trigger replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    pub trigger: String,
    pub expansion: String,
}

/// Raises the suppression flag for its lifetime.
///
/// The flag drops back to `false` on every exit path, unwinding included, so
/// a failed emission can never leave the engine deaf to real input.
pub struct SuppressionGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> SuppressionGuard<'a> {
    pub fn engage(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Key names the engine has emitted and expects the hook to report back.
///
/// Most hooks deliver synthetic input only after the firing callback has
/// returned, when the suppression flag is already down. Each emitted key is
/// recorded here first and the matching hook event is swallowed instead of
/// being typed into the buffer. Echoes arrive in emission order, so the first
/// event that does not match ends the sequence. Entries left over once the
/// window has passed are dropped.
#[derive(Debug, Default)]
pub struct EchoLedger {
    pending: VecDeque<String>,
    deadline: Option<Instant>,
}

impl EchoLedger {
    pub fn expect(&mut self, name: impl Into<String>) {
        self.pending.push_back(name.into());
        self.deadline = None;
    }

    /// Start the expiry window, called once emission has finished.
    pub fn arm(&mut self, now: Instant) {
        if !self.pending.is_empty() {
            self.deadline = Some(now + ECHO_WINDOW);
        }
    }

    /// Swallow `name` if it is the next expected echo.
    pub fn consume(&mut self, name: &str, now: Instant) -> bool {
        if self.deadline.is_some_and(|deadline| now > deadline) {
            self.clear();
            return false;
        }
        match self.pending.front() {
            Some(expected) if expected == name => {
                self.pending.pop_front();
                true
            }
            Some(_) => {
                tracing::debug!(key = name, "Echo sequence interrupted");
                self.clear();
                false
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.deadline = None;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Performs the keystroke side of a fire: erase the trigger, deliver the expansion.
pub struct FireController {
    emitter: Box<dyn KeyEmitter>,
    clipboard: Box<dyn ClipboardAccess>,
}

impl FireController {
    pub fn new(emitter: Box<dyn KeyEmitter>, clipboard: Box<dyn ClipboardAccess>) -> Self {
        Self { emitter, clipboard }
    }

    /// Send one backspace per trigger character, then write the expansion.
    ///
    /// Every key is entered into `echoes` before it is sent.
    pub fn replace(
        &mut self,
        trigger: &str,
        expansion: &str,
        paste_delay: Duration,
        echoes: &RefCell<EchoLedger>,
    ) -> Result<()> {
        let clipboard = self.clipboard.as_mut();
        self.emitter.session(&mut |keys: &mut dyn KeySink| -> Result<()> {
            for _ in trigger.chars() {
                echoes.borrow_mut().expect(BACKSPACE_KEY);
                keys.send(NamedKey::Backspace)?;
                thread::sleep(paste_delay);
            }

            safe_write(keys, &mut *clipboard, expansion, paste_delay, echoes)
        })
    }
}

/// Deliver `text` through a clipboard paste, restoring the previous clipboard.
///
/// Falls back to typing the text directly when the clipboard cannot be read
/// or written. An empty clipboard is cleared again afterwards. A failed
/// restore is logged and otherwise ignored.
pub fn safe_write(
    keys: &mut dyn KeySink,
    clipboard: &mut dyn ClipboardAccess,
    text: &str,
    paste_delay: Duration,
    echoes: &RefCell<EchoLedger>,
) -> Result<()> {
    let previous = match clipboard.get_text() {
        Ok(previous) => previous,
        Err(e) => {
            tracing::debug!("Clipboard unreadable, typing expansion: {}", e);
            return type_text(keys, text, echoes);
        }
    };

    if let Err(e) = clipboard.set_text(text) {
        tracing::debug!("Clipboard unwritable, typing expansion: {}", e);
        return type_text(keys, text, echoes);
    }

    thread::sleep(paste_delay);
    // The modifier of the chord never reaches the buffer, only its letter does
    echoes.borrow_mut().expect("v");
    let pasted = keys.send(NamedKey::Paste);
    thread::sleep(paste_delay);

    let restored = match previous {
        Some(previous) => clipboard.set_text(&previous),
        None => clipboard.clear(),
    };
    if let Err(e) = restored {
        tracing::debug!("Failed to restore clipboard: {}", e);
    }

    pasted
}

fn type_text(keys: &mut dyn KeySink, text: &str, echoes: &RefCell<EchoLedger>) -> Result<()> {
    {
        let mut echoes = echoes.borrow_mut();
        for name in text.chars().filter_map(key_name_for_char) {
            echoes.expect(name);
        }
    }
    keys.write(text)
}
