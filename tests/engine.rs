use keyflow::{
    ClipboardAccess, EngineOptions, EventHandler, Hotkeys, KeyEmitter, KeyEvent, KeyEventKind,
    KeySink, KeyboardHook, KeyflowError, NamedKey, NoClipboard, Result, TriggerEngine,
};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Key(NamedKey),
    Text(String),
}

/// Records emitted keystrokes and can feed them back into the engine, the way
/// a global hook observes synthetic input. Echoes are delivered on the spot,
/// or held back until `replay` when `deferred` is set.
#[derive(Clone, Default)]
struct Recorder {
    log: Arc<Mutex<Vec<Sent>>>,
    feedback: Arc<Mutex<Option<Weak<TriggerEngine>>>>,
    suppressed_seen: Arc<Mutex<Vec<bool>>>,
    queued: Arc<Mutex<Vec<KeyEvent>>>,
    deferred: bool,
    fail: bool,
}

impl Recorder {
    fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    fn backspaces(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| **s == Sent::Key(NamedKey::Backspace))
            .count()
    }

    fn loop_back(&self, engine: &Arc<TriggerEngine>) {
        *self.feedback.lock().unwrap() = Some(Arc::downgrade(engine));
    }

    fn echo(&self, events: Vec<KeyEvent>) {
        if self.deferred {
            self.queued.lock().unwrap().extend(events);
            return;
        }
        let engine = self.feedback.lock().unwrap().clone();
        if let Some(engine) = engine.and_then(|weak| weak.upgrade()) {
            self.suppressed_seen
                .lock()
                .unwrap()
                .push(engine.is_suppressed());
            for event in &events {
                engine.handle_event(event);
            }
        }
    }

    /// Deliver held-back echoes, as a hook does once the firing callback returns.
    fn replay(&self, engine: &TriggerEngine) -> usize {
        let events: Vec<KeyEvent> = self.queued.lock().unwrap().drain(..).collect();
        for event in &events {
            engine.handle_event(event);
        }
        events.len()
    }
}

fn keystroke(name: &str) -> Vec<KeyEvent> {
    vec![KeyEvent::down(name), KeyEvent::up(name)]
}

impl KeySink for Recorder {
    fn send(&mut self, key: NamedKey) -> Result<()> {
        if self.fail {
            return Err(KeyflowError::Enigo("no display".to_string()));
        }
        self.log.lock().unwrap().push(Sent::Key(key));
        match key {
            NamedKey::Backspace => self.echo(keystroke("backspace")),
            NamedKey::Paste => self.echo(vec![
                KeyEvent::down("ctrl"),
                KeyEvent::down("v"),
                KeyEvent::up("v"),
                KeyEvent::up("ctrl"),
            ]),
        }
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Text(text.to_string()));
        let events = text.chars().flat_map(|c| keystroke(&key_name(c))).collect();
        self.echo(events);
        Ok(())
    }
}

impl KeyEmitter for Recorder {
    fn session(&mut self, fire: &mut dyn FnMut(&mut dyn KeySink) -> Result<()>) -> Result<()> {
        fire(self)
    }
}

#[derive(Clone, Default)]
struct MemoryClipboard(Arc<Mutex<Option<String>>>);

impl ClipboardAccess for MemoryClipboard {
    fn get_text(&mut self) -> Result<Option<String>> {
        Ok(self.0.lock().unwrap().clone())
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        *self.0.lock().unwrap() = Some(text.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        *self.0.lock().unwrap() = None;
        Ok(())
    }
}

struct ScriptedHook(Vec<KeyEvent>);

impl KeyboardHook for ScriptedHook {
    fn run(self, mut handler: EventHandler) -> Result<()> {
        for event in self.0 {
            handler(event);
        }
        Ok(())
    }
}

struct BrokenHook;

impl KeyboardHook for BrokenHook {
    fn run(self, _handler: EventHandler) -> Result<()> {
        Err(KeyflowError::Hook("permission denied".to_string()))
    }
}

fn hotkeys(pairs: &[(&str, &str)]) -> Hotkeys {
    pairs
        .iter()
        .map(|(t, e)| (t.to_string(), e.to_string()))
        .collect()
}

fn key_name(c: char) -> String {
    match c {
        ' ' => "space".to_string(),
        '\n' => "enter".to_string(),
        '\t' => "tab".to_string(),
        c => c.to_string(),
    }
}

fn press(engine: &TriggerEngine, name: &str) {
    engine.handle_event(&KeyEvent::down(name));
    engine.handle_event(&KeyEvent::up(name));
}

fn type_text(engine: &TriggerEngine, text: &str) {
    for c in text.chars() {
        press(engine, &key_name(c));
    }
}

fn options(pairs: &[(&str, &str)], cooldown: f64) -> EngineOptions {
    EngineOptions {
        hotkeys: hotkeys(pairs),
        cooldown,
        paste_delay: 0.0,
    }
}

fn engine_with(pairs: &[(&str, &str)], cooldown: f64) -> (TriggerEngine, Recorder, MemoryClipboard) {
    let recorder = Recorder::default();
    let clipboard = MemoryClipboard::default();
    let engine = TriggerEngine::new(options(pairs, cooldown), recorder.clone(), clipboard.clone());
    (engine, recorder, clipboard)
}

fn collect_fires(engine: TriggerEngine) -> (TriggerEngine, Arc<Mutex<Vec<(String, String)>>>) {
    let fires = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fires);
    let engine = engine.with_fire_callback(move |trigger, expansion| {
        sink.lock()
            .unwrap()
            .push((trigger.to_string(), expansion.to_string()));
    });
    (engine, fires)
}

#[test]
fn test_typing_trigger_fires_once_and_clears_buffer() {
    let (engine, recorder, clipboard) = engine_with(&[("brb", "be right back")], 0.0);
    *clipboard.0.lock().unwrap() = Some("previous".to_string());

    type_text(&engine, "brb");

    assert_eq!(engine.get_stats().fired, 1);
    assert_eq!(engine.buffer_contents(), "");
    assert_eq!(recorder.backspaces(), 3);
    assert_eq!(recorder.sent().last(), Some(&Sent::Key(NamedKey::Paste)));
    assert_eq!(clipboard.0.lock().unwrap().as_deref(), Some("previous"));
}

#[test]
fn test_longest_trigger_wins() {
    let (engine, recorder, _) = engine_with(&[("br", "B"), ("abbr", "A")], 0.0);
    let (engine, fires) = collect_fires(engine);

    type_text(&engine, "xxabbr");

    assert_eq!(
        *fires.lock().unwrap(),
        vec![("abbr".to_string(), "A".to_string())]
    );
    assert_eq!(recorder.backspaces(), 4);
}

#[test]
fn test_whitespace_breaks_trigger() {
    let (engine, _, _) = engine_with(&[("abcd", "x")], 0.0);

    type_text(&engine, "ab cd");
    type_text(&engine, "ab\tcd");
    type_text(&engine, "ab\ncd");

    assert_eq!(engine.get_stats().fired, 0);
}

#[test]
fn test_cooldown_debounces_fires() {
    let (engine, _, _) = engine_with(&[("brb", "be right back")], 0.3);

    type_text(&engine, "brb");
    type_text(&engine, "brb");
    assert_eq!(engine.get_stats().fired, 1);

    thread::sleep(Duration::from_millis(400));
    type_text(&engine, "brb");
    assert_eq!(engine.get_stats().fired, 2);
}

#[test]
fn test_own_keystrokes_do_not_retrigger() {
    let recorder = Recorder::default();
    let engine = Arc::new(TriggerEngine::new(
        options(&[("brb", "brb and brb")], 0.0),
        recorder.clone(),
        NoClipboard,
    ));
    recorder.loop_back(&engine);

    type_text(&engine, "brb");

    assert_eq!(engine.get_stats().fired, 1);
    assert_eq!(engine.buffer_contents(), "");
    assert!(!engine.is_suppressed());
    assert_eq!(recorder.backspaces(), 3);
    assert_eq!(
        recorder.sent().last(),
        Some(&Sent::Text("brb and brb".to_string()))
    );
    assert!(recorder.suppressed_seen.lock().unwrap().iter().all(|s| *s));
}

#[test]
fn test_paste_chord_feedback_is_ignored() {
    let recorder = Recorder::default();
    let clipboard = MemoryClipboard::default();
    *clipboard.0.lock().unwrap() = Some("kept".to_string());
    let engine = Arc::new(TriggerEngine::new(
        options(&[("sig", "Regards"), ("v", "vee")], 0.0),
        recorder.clone(),
        clipboard.clone(),
    ));
    recorder.loop_back(&engine);

    type_text(&engine, "sig");

    // The echoed "v" of the paste chord must not fire the "v" trigger
    assert_eq!(engine.get_stats().fired, 1);
    assert_eq!(engine.buffer_contents(), "");
    assert_eq!(recorder.sent().last(), Some(&Sent::Key(NamedKey::Paste)));
    assert_eq!(clipboard.0.lock().unwrap().as_deref(), Some("kept"));
}

#[test]
fn test_update_hotkeys_is_idempotent() {
    let map = hotkeys(&[("omw", "on my way")]);
    let (engine, _, _) = engine_with(&[("omw", "on my way")], 0.0);

    engine.update_hotkeys(&map);
    engine.update_hotkeys(&map);
    type_text(&engine, "xxxxom");
    assert_eq!(engine.buffer_contents(), "xom");

    press(&engine, "w");
    assert_eq!(engine.get_stats().fired, 1);
}

#[test]
fn test_update_hotkeys_truncates_live_buffer() {
    let (engine, _, _) = engine_with(&[("abcdef", "x")], 0.0);
    type_text(&engine, "abcd");
    assert_eq!(engine.buffer_contents(), "abcd");

    engine.update_hotkeys(&hotkeys(&[("xy", "z")]));
    assert_eq!(engine.buffer_contents(), "cd");

    engine.update_hotkeys(&Hotkeys::new());
    assert_eq!(engine.buffer_contents(), "");
    type_text(&engine, "abcdef");
    assert_eq!(engine.get_stats().fired, 0);
}

#[test]
fn test_shift_and_caps_lock_resolution() {
    let (engine, _, _) = engine_with(&[("qqqqqqqq", "x")], 0.0);

    press(&engine, "a");
    engine.handle_event(&KeyEvent::down("shift"));
    press(&engine, "b");
    press(&engine, "1");
    engine.handle_event(&KeyEvent::up("shift"));

    // Caps lock toggles on key down only
    engine.handle_event(&KeyEvent::down("caps lock"));
    engine.handle_event(&KeyEvent::up("caps lock"));
    press(&engine, "c");
    engine.handle_event(&KeyEvent::down("left shift"));
    press(&engine, "d");
    engine.handle_event(&KeyEvent::up("left shift"));

    assert_eq!(engine.buffer_contents(), "aB!Cd");
}

#[test]
fn test_uppercase_trigger_needs_shift() {
    let (engine, _, _) = engine_with(&[("Hi", "Hello")], 0.0);

    type_text(&engine, "hi");
    assert_eq!(engine.get_stats().fired, 0);

    engine.handle_event(&KeyEvent::down("right shift"));
    press(&engine, "h");
    engine.handle_event(&KeyEvent::up("right shift"));
    press(&engine, "i");
    assert_eq!(engine.get_stats().fired, 1);
}

#[test]
fn test_disabling_discards_partial_trigger() {
    let (engine, _, _) = engine_with(&[("brb", "be right back")], 0.0);

    type_text(&engine, "br");
    assert!(!engine.toggle_enabled());
    assert_eq!(engine.buffer_contents(), "");
    type_text(&engine, "brb");
    assert_eq!(engine.get_stats().fired, 0);

    assert!(engine.toggle_enabled());
    press(&engine, "b");
    assert_eq!(engine.get_stats().fired, 0);

    engine.set_enabled(false);
    engine.set_enabled(true);
    type_text(&engine, "brb");
    assert_eq!(engine.get_stats().fired, 1);
}

#[test]
fn test_backspace_pops_without_matching() {
    let (engine, _, _) = engine_with(&[("ab", "X"), ("zzzz", "Z")], 10.0);

    type_text(&engine, "ab");
    assert_eq!(engine.get_stats().fired, 1);

    // Second match lands inside the cooldown and stays in the buffer
    type_text(&engine, "abc");
    assert_eq!(engine.buffer_contents(), "abc");

    engine.set_cooldown(0.0);
    press(&engine, "backspace");
    assert_eq!(engine.buffer_contents(), "ab");
    assert_eq!(engine.get_stats().fired, 1);

    press(&engine, "backspace");
    assert_eq!(engine.buffer_contents(), "a");
}

#[test]
fn test_non_key_and_key_up_events_ignored() {
    let (engine, _, _) = engine_with(&[("ab", "X")], 0.0);

    engine.handle_event(&KeyEvent::new(KeyEventKind::Other, "a"));
    engine.handle_event(&KeyEvent::up("a"));
    engine.handle_event(&KeyEvent::down("f5"));
    engine.handle_event(&KeyEvent::down("left"));
    assert_eq!(engine.buffer_contents(), "");
}

#[test]
fn test_key_names_are_case_insensitive() {
    let (engine, _, _) = engine_with(&[("ab", "X")], 0.0);
    engine.handle_event(&KeyEvent::down("Shift"));
    engine.handle_event(&KeyEvent::up("SHIFT"));
    engine.handle_event(&KeyEvent::down("A"));
    engine.handle_event(&KeyEvent::down("B"));
    assert_eq!(engine.get_stats().fired, 1);
}

#[test]
fn test_emission_failure_releases_suppression() {
    let recorder = Recorder {
        fail: true,
        ..Recorder::default()
    };
    let engine = TriggerEngine::new(options(&[("ab", "X")], 0.0), recorder, NoClipboard);
    let (engine, fires) = collect_fires(engine);

    type_text(&engine, "ab");

    assert_eq!(engine.get_stats().fired, 0);
    assert!(fires.lock().unwrap().is_empty());
    assert!(!engine.is_suppressed());
    assert_eq!(engine.buffer_contents(), "");

    // The engine keeps processing input afterwards
    type_text(&engine, "xa");
    assert_eq!(engine.buffer_contents(), "xa");
}

#[test]
fn test_panicking_callback_is_contained() {
    let (engine, _, _) = engine_with(&[("ab", "X")], 0.0);
    let engine = engine.with_fire_callback(|_, _| panic!("telemetry down"));

    type_text(&engine, "ab");
    type_text(&engine, "ab");

    assert_eq!(engine.get_stats().fired, 2);
}

#[test]
fn test_timing_settings_are_clamped() {
    let (engine, _, _) = engine_with(&[("ab", "X")], 0.0);

    engine.set_cooldown(-5.0);
    engine.set_paste_delay(f64::NAN);
    assert_eq!(engine.cooldown(), Duration::ZERO);
    assert_eq!(engine.paste_delay(), Duration::ZERO);

    engine.set_paste_delay(0.02);
    assert_eq!(engine.paste_delay(), Duration::from_millis(20));
}

#[test]
fn test_start_runs_hook_events() {
    let (engine, recorder, _) = engine_with(&[("ty", "thank you")], 0.0);
    let engine = Arc::new(engine);
    let events = vec![
        KeyEvent::down("t"),
        KeyEvent::up("t"),
        KeyEvent::down("y"),
        KeyEvent::up("y"),
    ];

    engine.start(ScriptedHook(events)).unwrap();
    assert!(engine.is_running());
    assert_eq!(engine.get_stats().fired, 1);
    assert_eq!(recorder.backspaces(), 2);

    // Second start is a no-op
    engine.start(BrokenHook).unwrap();
}

#[test]
fn test_start_surfaces_hook_failure() {
    let (engine, _, _) = engine_with(&[("ty", "thank you")], 0.0);
    let engine = Arc::new(engine);

    let err = engine.start(BrokenHook).unwrap_err();
    assert!(matches!(err, KeyflowError::Hook(_)));
    assert!(!engine.is_running());
    assert!(!engine.hook_alive());
}

#[test]
fn test_control_surface_from_another_thread() {
    let (engine, _, _) = engine_with(&[("ab", "X")], 0.0);
    let engine = Arc::new(engine);

    let controller = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..50 {
                let trigger = if i % 2 == 0 { "ab" } else { "abc" };
                engine.update_hotkeys(&hotkeys(&[(trigger, "X")]));
                engine.set_cooldown(0.0);
            }
            engine.update_hotkeys(&hotkeys(&[("ab", "X")]));
        })
    };

    for _ in 0..50 {
        type_text(&engine, "zz ");
    }
    controller.join().unwrap();

    type_text(&engine, "ab");
    assert_eq!(engine.get_stats().fired, 1);
}

#[test]
fn test_late_paste_echo_is_not_typed() {
    let recorder = Recorder::deferred();
    let clipboard = MemoryClipboard::default();
    *clipboard.0.lock().unwrap() = Some("kept".to_string());
    let engine = TriggerEngine::new(
        options(&[("sig", "Regards"), ("v", "vee")], 0.0),
        recorder.clone(),
        clipboard.clone(),
    );

    type_text(&engine, "sig");
    assert_eq!(engine.get_stats().fired, 1);

    // Three backspaces plus the paste chord, delivered after the fire
    assert_eq!(recorder.replay(&engine), 10);
    assert_eq!(engine.get_stats().fired, 1);
    assert_eq!(engine.buffer_contents(), "");
    assert_eq!(clipboard.0.lock().unwrap().as_deref(), Some("kept"));

    // Real typing afterwards is matched again
    press(&engine, "v");
    assert_eq!(engine.get_stats().fired, 2);
}

#[test]
fn test_late_typed_echo_is_not_rescanned() {
    let recorder = Recorder::deferred();
    let engine = TriggerEngine::new(
        options(&[("brb", "Brb, brb.")], 0.0),
        recorder.clone(),
        NoClipboard,
    );

    type_text(&engine, "brb");
    recorder.replay(&engine);

    assert_eq!(engine.get_stats().fired, 1);
    assert_eq!(engine.buffer_contents(), "");
    assert_eq!(
        recorder.sent().last(),
        Some(&Sent::Text("Brb, brb.".to_string()))
    );

    type_text(&engine, "xy");
    assert_eq!(engine.buffer_contents(), "xy");
}

#[test]
fn test_late_backspace_echo_keeps_new_typing() {
    let recorder = Recorder::deferred();
    let engine = TriggerEngine::new(
        options(&[("ab", "X"), ("zzzz", "Z")], 0.0),
        recorder.clone(),
        MemoryClipboard::default(),
    );

    type_text(&engine, "ab");
    recorder.replay(&engine);
    type_text(&engine, "zz");
    press(&engine, "backspace");

    assert_eq!(engine.buffer_contents(), "z");
}

#[test]
fn test_empty_clipboard_still_pastes() {
    let (engine, recorder, clipboard) = engine_with(&[("addr", "1 Main St\nSpringfield")], 0.0);

    type_text(&engine, "addr");

    assert_eq!(engine.get_stats().fired, 1);
    assert_eq!(recorder.sent().last(), Some(&Sent::Key(NamedKey::Paste)));
    assert!(!recorder
        .sent()
        .iter()
        .any(|sent| matches!(sent, Sent::Text(_))));
    assert!(clipboard.0.lock().unwrap().is_none());
}

#[test]
fn test_ctrl_f12_toggles_matching() {
    let (engine, _, _) = engine_with(&[("brb", "be right back")], 0.0);

    type_text(&engine, "br");
    engine.handle_event(&KeyEvent::down("ctrl"));
    press(&engine, "f12");
    engine.handle_event(&KeyEvent::up("ctrl"));
    assert!(!engine.is_enabled());
    assert_eq!(engine.buffer_contents(), "");

    type_text(&engine, "brb");
    assert_eq!(engine.get_stats().fired, 0);

    // F12 alone does nothing
    press(&engine, "f12");
    assert!(!engine.is_enabled());

    engine.handle_event(&KeyEvent::down("Ctrl"));
    press(&engine, "F12");
    engine.handle_event(&KeyEvent::up("Ctrl"));
    assert!(engine.is_enabled());
    type_text(&engine, "brb");
    assert_eq!(engine.get_stats().fired, 1);
}
