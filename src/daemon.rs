use crate::clipboard::{NoClipboard, SystemClipboard};
use crate::config::{
    ensure_config_dir, get_log_file_path, get_paused_file_path, get_pid_file_path,
    get_stats_file_path, is_daemon_running, load_settings_at, CONFIG_FILENAME, HOTKEYS_FILENAME,
};
use crate::engine::{EngineOptions, EngineStats, TriggerEngine};
use crate::error::{KeyflowError, Result};
use crate::keyboard::EnigoEmitter;
use crate::keyboard_listener::RdevHook;
use crate::storage::load_hotkeys_at;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fire statistics the worker publishes for `keyflow status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub fired: u64,
    pub updated_at: DateTime<Local>,
}

/// Start the daemon process
pub fn start_daemon(foreground: bool) -> Result<()> {
    // Check if daemon is already running
    if let Some(pid) = is_daemon_running()? {
        return Err(KeyflowError::DaemonAlreadyRunning(pid));
    }

    ensure_config_dir()?;

    if foreground {
        println!("Starting keyflow in the foreground (Ctrl+C to quit)");
        return run_daemon_worker();
    }

    // Fork to background on Unix systems
    #[cfg(unix)]
    {
        use daemonize::Daemonize;
        let log_path = get_log_file_path();
        println!("Starting keyflow daemon in the background");
        println!("Logs: {}", log_path.display());

        let daemonize = Daemonize::new()
            .working_directory("/tmp")
            .stdout(File::create("/dev/null")?)
            .stderr(File::create(&log_path)?);

        match daemonize.start() {
            Ok(_) => run_daemon_worker(), // We're now in the daemon process
            Err(e) => Err(KeyflowError::Other(format!("Error starting daemon: {}", e))),
        }
    }

    // For non-Unix systems, just continue execution
    #[cfg(not(unix))]
    {
        println!("Starting keyflow daemon in the foreground (background not supported on this OS)");
        run_daemon_worker()
    }
}

fn build_engine(dir: &Path) -> Result<TriggerEngine> {
    let settings = load_settings_at(dir)?;
    let hotkeys = load_hotkeys_at(dir)?;
    tracing::info!(
        "Loaded {} hotkey(s), cooldown {}s, paste delay {}s",
        hotkeys.len(),
        settings.cooldown,
        settings.paste_delay
    );

    let options = EngineOptions::from_settings(&settings, hotkeys);
    let engine = match SystemClipboard::open() {
        Ok(clipboard) => TriggerEngine::new(options, EnigoEmitter, clipboard),
        Err(e) => {
            tracing::warn!("Clipboard unavailable, expansions will be typed directly: {}", e);
            TriggerEngine::new(options, EnigoEmitter, NoClipboard)
        }
    };

    Ok(engine.with_fire_callback(|trigger, _| {
        tracing::info!(trigger = %trigger, "Expanded trigger");
    }))
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Watches a file's modification time between polls.
struct FileWatch {
    path: PathBuf,
    last: Option<SystemTime>,
}

impl FileWatch {
    fn new(path: PathBuf) -> Self {
        let last = modified(&path);
        Self { path, last }
    }

    fn changed(&mut self) -> bool {
        let current = modified(&self.path);
        if current != self.last {
            self.last = current;
            return true;
        }
        false
    }
}

/// The actual daemon worker process
pub fn run_daemon_worker() -> Result<()> {
    let dir = ensure_config_dir()?;

    let pid_file = get_pid_file_path();
    let mut file = File::create(&pid_file)?;
    write!(file, "{}", process::id())?;

    let result = drive_engine(&dir);

    if let Err(e) = fs::remove_file(&pid_file) {
        tracing::warn!("Error removing PID file: {}", e);
    }
    result
}

fn drive_engine(dir: &Path) -> Result<()> {
    let engine = Arc::new(build_engine(dir)?);
    let paused_path = get_paused_file_path();
    engine.set_enabled(!paused_path.exists());
    engine.start(RdevHook)?;

    let mut hotkeys_watch = FileWatch::new(dir.join(HOTKEYS_FILENAME));
    let mut settings_watch = FileWatch::new(dir.join(CONFIG_FILENAME));
    let mut published = EngineStats::default();

    loop {
        thread::sleep(POLL_INTERVAL);

        if !engine.hook_alive() {
            return Err(KeyflowError::Hook("keyboard listener exited".to_string()));
        }

        if hotkeys_watch.changed() {
            match load_hotkeys_at(dir) {
                Ok(hotkeys) => engine.update_hotkeys(&hotkeys),
                Err(e) => tracing::warn!("Failed to reload hotkeys: {}", e),
            }
        }

        if settings_watch.changed() {
            match load_settings_at(dir) {
                Ok(settings) => {
                    engine.set_cooldown(settings.cooldown);
                    engine.set_paste_delay(settings.paste_delay);
                    tracing::info!("Settings reloaded");
                }
                Err(e) => tracing::warn!("Failed to reload settings: {}", e),
            }
        }

        let paused = paused_path.exists();
        if paused == engine.is_enabled() {
            engine.set_enabled(!paused);
        }

        let stats = engine.get_stats();
        if stats != published {
            if let Err(e) = write_stats(&stats) {
                tracing::warn!("Failed to write stats: {}", e);
            }
            published = stats;
        }
    }
}

fn write_stats(stats: &EngineStats) -> Result<()> {
    let snapshot = StatsSnapshot {
        fired: stats.fired,
        updated_at: Local::now(),
    };
    fs::write(get_stats_file_path(), serde_json::to_string_pretty(&snapshot)?)?;
    Ok(())
}

fn read_stats() -> Option<StatsSnapshot> {
    let content = fs::read_to_string(get_stats_file_path()).ok()?;
    serde_json::from_str(&content).ok()
}

/// Stop the daemon if it's running
pub fn stop_daemon() -> Result<()> {
    let pid_file = get_pid_file_path();

    if !pid_file.exists() {
        return Err(KeyflowError::DaemonNotRunning);
    }

    let pid_str = fs::read_to_string(&pid_file)?;
    let pid = pid_str
        .trim()
        .parse::<u32>()
        .map_err(|_| KeyflowError::InvalidPid)?;

    #[cfg(unix)]
    let status = process::Command::new("kill").arg(pid.to_string()).status();

    #[cfg(windows)]
    let status = process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status();

    #[cfg(not(any(unix, windows)))]
    let status: std::io::Result<process::ExitStatus> = Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "stopping the daemon is not supported on this platform",
    ));

    match status {
        Ok(status) if status.success() => {
            println!("Stopped keyflow daemon with PID {}", pid);
            fs::remove_file(&pid_file)?;
            Ok(())
        }
        _ => Err(KeyflowError::Other(format!(
            "Failed to stop daemon with PID {}",
            pid
        ))),
    }
}

/// Pause or resume matching in a running daemon
pub fn set_paused(paused: bool) -> Result<()> {
    ensure_config_dir()?;
    let marker = get_paused_file_path();
    if paused {
        fs::write(&marker, "")?;
        println!("keyflow paused");
    } else {
        if marker.exists() {
            fs::remove_file(&marker)?;
        }
        println!("keyflow resumed");
    }
    Ok(())
}

/// Check daemon status
pub fn daemon_status() -> Result<()> {
    match is_daemon_running()? {
        Some(pid) => {
            let state = if get_paused_file_path().exists() {
                "paused"
            } else {
                "active"
            };
            println!("keyflow daemon is running with PID {} ({})", pid, state);
            if let Some(stats) = read_stats() {
                println!(
                    "Expansions fired: {} (as of {})",
                    stats.fired,
                    stats.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        None => println!("keyflow daemon is not running"),
    }
    Ok(())
}
