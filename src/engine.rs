//! The trigger engine: turns a serial stream of key events into expansions.
//!
//! All mutable state sits behind one re-entrant lock. Event handling and the
//! control surface both acquire it, and a fire runs to completion while it is
//! held, so no keystroke is matched against a buffer that is being rewritten.

use crate::buffer::TypingBuffer;
use crate::clipboard::ClipboardAccess;
use crate::config::{clamp_seconds, Settings, DEFAULT_COOLDOWN, DEFAULT_PASTE_DELAY};
use crate::error::{KeyflowError, Result};
use crate::expansion::{EchoLedger, FireController, Fired, SuppressionGuard};
use crate::keyboard::{
    is_ctrl_key, is_shift_key, resolve_key, KeyEmitter, BACKSPACE_KEY, CAPS_LOCK_KEY, TOGGLE_KEY,
};
use crate::keyboard_listener::KeyboardHook;
use crate::triggers::{find_match, Hotkeys, TriggerIndex};

use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `start` waits for the hook worker to report an installation failure.
const HOOK_STARTUP_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
    Other,
}

/// A raw key event as delivered by the keyboard hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub name: String,
}

impl KeyEvent {
    pub fn new(kind: KeyEventKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn down(name: impl Into<String>) -> Self {
        Self::new(KeyEventKind::Down, name)
    }

    pub fn up(name: impl Into<String>) -> Self {
        Self::new(KeyEventKind::Up, name)
    }
}

/// Construction parameters for a [`TriggerEngine`]. Durations are in seconds.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub hotkeys: Hotkeys,
    pub cooldown: f64,
    pub paste_delay: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            hotkeys: Hotkeys::new(),
            cooldown: DEFAULT_COOLDOWN,
            paste_delay: DEFAULT_PASTE_DELAY,
        }
    }
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings, hotkeys: Hotkeys) -> Self {
        Self {
            hotkeys,
            cooldown: settings.cooldown,
            paste_delay: settings.paste_delay,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub fired: u64,
}

type FireCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

struct EngineState {
    index: TriggerIndex,
    buffer: TypingBuffer,
    shift_active: bool,
    ctrl_active: bool,
    caps_lock_active: bool,
    enabled: bool,
    cooldown: Duration,
    paste_delay: Duration,
    last_fire: Option<Instant>,
    fired_count: u64,
}

/// Everything guarded by the engine lock.
///
/// The suppression flag, echo ledger and fire controller live outside the
/// state cell so that a key event delivered re-entrantly during a fire can
/// still reach the state while the controller is busy.
struct Shared {
    state: RefCell<EngineState>,
    suppressed: Cell<bool>,
    echoes: RefCell<EchoLedger>,
    fire: RefCell<FireController>,
}

pub struct TriggerEngine {
    shared: ReentrantMutex<Shared>,
    on_fire: FireCallback,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TriggerEngine {
    pub fn new(
        options: EngineOptions,
        emitter: impl KeyEmitter + 'static,
        clipboard: impl ClipboardAccess + 'static,
    ) -> Self {
        let index = TriggerIndex::new(&options.hotkeys);
        let buffer = TypingBuffer::new(index.max_trigger_len());
        let state = EngineState {
            index,
            buffer,
            shift_active: false,
            ctrl_active: false,
            caps_lock_active: false,
            enabled: true,
            cooldown: clamp_seconds(options.cooldown),
            paste_delay: clamp_seconds(options.paste_delay),
            last_fire: None,
            fired_count: 0,
        };

        Self {
            shared: ReentrantMutex::new(Shared {
                state: RefCell::new(state),
                suppressed: Cell::new(false),
                echoes: RefCell::new(EchoLedger::default()),
                fire: RefCell::new(FireController::new(Box::new(emitter), Box::new(clipboard))),
            }),
            on_fire: Box::new(|_: &str, _: &str| {}),
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Register the callback invoked with `(trigger, expansion)` after every fire.
    pub fn with_fire_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.on_fire = Box::new(callback);
        self
    }

    /// Spawn the hook worker and begin consuming events.
    ///
    /// Starting a running engine is a no-op. A hook that fails to install is
    /// reported here and leaves the engine stopped.
    pub fn start<H: KeyboardHook>(self: &Arc<Self>, hook: H) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Trigger engine already running");
            return Ok(());
        }

        let engine = Arc::clone(self);
        let (failure_tx, failure_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("keyflow-hook".to_string())
            .spawn(move || {
                let handler = Arc::clone(&engine);
                let outcome = hook.run(Box::new(move |event: KeyEvent| {
                    handler.handle_event(&event)
                }));
                if let Err(e) = outcome {
                    tracing::error!("Keyboard hook stopped: {}", e);
                    let _ = failure_tx.send(e);
                }
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(KeyflowError::Hook(format!("failed to spawn hook worker: {}", e)));
            }
        };

        match failure_rx.recv_timeout(HOOK_STARTUP_GRACE) {
            Ok(err) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                tracing::info!("Trigger engine started");
                *self.worker.lock() = Some(handle);
                Ok(())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// False once the hook worker has exited after a successful start.
    pub fn hook_alive(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Handle one key event. Events must arrive serially, in hook order.
    pub fn handle_event(&self, event: &KeyEvent) {
        if event.kind == KeyEventKind::Other {
            return;
        }
        let name = event.name.to_lowercase();

        let fired = {
            let shared = self.shared.lock();
            match Self::process_locked(&shared, event.kind, &name) {
                Some((trigger, expansion, paste_delay)) => {
                    Self::fire_locked(&shared, trigger, expansion, paste_delay)
                }
                None => None,
            }
        };

        if let Some(fired) = fired {
            self.notify(&fired);
        }
    }

    /// Apply an event to the state and return the match to fire, if any.
    fn process_locked(
        shared: &Shared,
        kind: KeyEventKind,
        name: &str,
    ) -> Option<(String, String, Duration)> {
        let mut state = shared.state.borrow_mut();

        if is_shift_key(name) {
            state.shift_active = kind == KeyEventKind::Down;
            return None;
        }

        if is_ctrl_key(name) {
            state.ctrl_active = kind == KeyEventKind::Down;
            return None;
        }

        if name == CAPS_LOCK_KEY {
            if kind == KeyEventKind::Down {
                state.caps_lock_active = !state.caps_lock_active;
            }
            return None;
        }

        if kind != KeyEventKind::Down {
            return None;
        }

        if name == TOGGLE_KEY && state.ctrl_active {
            if !shared.suppressed.get() {
                let enabled = !state.enabled;
                Self::apply_enabled(&mut state, enabled);
            }
            return None;
        }

        // Keys the engine emitted itself never count as typing
        let resolved = resolve_key(name, state.shift_active, state.caps_lock_active);
        if (resolved.is_some() || name == BACKSPACE_KEY)
            && shared.echoes.borrow_mut().consume(name, Instant::now())
        {
            return None;
        }

        if name == BACKSPACE_KEY {
            state.buffer.pop_one();
            return None;
        }

        if !state.enabled || shared.suppressed.get() || state.index.is_empty() {
            return None;
        }

        let c = resolved?;
        if c.is_whitespace() {
            state.buffer.clear();
            return None;
        }
        state.buffer.push(c);

        let (trigger, expansion) =
            find_match(state.buffer.as_str(), state.index.lookup_candidates())
                .map(|(t, e)| (t.to_string(), e.to_string()))?;

        let now = Instant::now();
        if let Some(last) = state.last_fire {
            if now.duration_since(last) < state.cooldown {
                tracing::debug!(trigger = %trigger, "Match ignored during cooldown");
                return None;
            }
        }
        state.last_fire = Some(now);

        Some((trigger, expansion, state.paste_delay))
    }

    /// Replace the typed trigger with its expansion while holding the lock.
    fn fire_locked(
        shared: &Shared,
        trigger: String,
        expansion: String,
        paste_delay: Duration,
    ) -> Option<Fired> {
        let _suppression = SuppressionGuard::engage(&shared.suppressed);
        let result = shared
            .fire
            .borrow_mut()
            .replace(&trigger, &expansion, paste_delay, &shared.echoes);
        shared.echoes.borrow_mut().arm(Instant::now());

        let mut state = shared.state.borrow_mut();
        state.buffer.clear();
        match result {
            Ok(()) => {
                state.fired_count += 1;
                tracing::debug!(trigger = %trigger, fired = state.fired_count, "Expanded trigger");
                Some(Fired { trigger, expansion })
            }
            Err(e) => {
                tracing::warn!("Failed to expand '{}': {}", trigger, e);
                None
            }
        }
    }

    fn notify(&self, fired: &Fired) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            (self.on_fire)(&fired.trigger, &fired.expansion)
        }));
        if outcome.is_err() {
            tracing::warn!("Fire callback panicked for '{}'", fired.trigger);
        }
    }

    /// Enable or disable matching. Disabling discards any partial input.
    pub fn set_enabled(&self, enabled: bool) {
        let shared = self.shared.lock();
        let mut state = shared.state.borrow_mut();
        Self::apply_enabled(&mut state, enabled);
    }

    fn apply_enabled(state: &mut EngineState, enabled: bool) {
        state.enabled = enabled;
        if !enabled {
            state.buffer.clear();
        }
        tracing::info!(enabled, "Trigger engine toggled");
    }

    /// Flip the enabled flag and return the new value.
    pub fn toggle_enabled(&self) -> bool {
        let shared = self.shared.lock();
        let enabled = !shared.state.borrow().enabled;
        self.set_enabled(enabled);
        enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.lock().state.borrow().enabled
    }

    /// Atomically install a new trigger mapping.
    pub fn update_hotkeys(&self, hotkeys: &Hotkeys) {
        let shared = self.shared.lock();
        let mut state = shared.state.borrow_mut();
        state.index.replace(hotkeys);
        let bound = state.index.max_trigger_len();
        state.buffer.resize_bound(bound);
        tracing::info!(triggers = state.index.len(), "Hotkeys updated");
    }

    pub fn set_cooldown(&self, seconds: f64) {
        self.shared.lock().state.borrow_mut().cooldown = clamp_seconds(seconds);
    }

    pub fn set_paste_delay(&self, seconds: f64) {
        self.shared.lock().state.borrow_mut().paste_delay = clamp_seconds(seconds);
    }

    pub fn cooldown(&self) -> Duration {
        self.shared.lock().state.borrow().cooldown
    }

    pub fn paste_delay(&self) -> Duration {
        self.shared.lock().state.borrow().paste_delay
    }

    pub fn get_stats(&self) -> EngineStats {
        EngineStats {
            fired: self.shared.lock().state.borrow().fired_count,
        }
    }

    /// Current contents of the typing buffer.
    pub fn buffer_contents(&self) -> String {
        self.shared.lock().state.borrow().buffer.as_str().to_string()
    }

    /// Whether the engine is currently emitting its own keystrokes.
    pub fn is_suppressed(&self) -> bool {
        self.shared.lock().suppressed.get()
    }
}
