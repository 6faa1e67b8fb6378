//! Keyflow - A real-time text expansion engine.
//!
//! Keyflow watches the global keyboard stream and, when the most recently
//! typed characters end in a registered trigger, erases the trigger and
//! pastes its expansion in place.

pub mod buffer;
pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod expansion;
pub mod keyboard;
pub mod keyboard_listener;
pub mod storage;
pub mod triggers;

// Re-export
pub use buffer::TypingBuffer;
pub use clipboard::{ClipboardAccess, NoClipboard, SystemClipboard};
pub use config::{get_config_dir, is_daemon_running, Settings};
pub use daemon::{daemon_status, run_daemon_worker, start_daemon, stop_daemon};
pub use engine::{EngineOptions, EngineStats, KeyEvent, KeyEventKind, TriggerEngine};
pub use error::{KeyflowError, Result};
pub use expansion::{EchoLedger, FireController, Fired};
pub use keyboard::{resolve_key, EnigoEmitter, KeyEmitter, KeySink, NamedKey};
pub use keyboard_listener::{EventHandler, KeyboardHook, RdevHook};
pub use storage::{add_hotkey, delete_hotkey, load_hotkeys, update_hotkey, HotkeyFormat};
pub use triggers::{find_match, Hotkeys, TriggerIndex};
