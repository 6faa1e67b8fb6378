use crate::cli::Commands;
use crate::config::{load_settings, save_settings};
use crate::daemon::{daemon_status, set_paused, start_daemon, stop_daemon};
use crate::error::Result;
use crate::storage::{
    add_hotkey, delete_hotkey, export_hotkeys, import_hotkeys, load_hotkeys, update_hotkey,
};

pub fn handle_command(command: Option<Commands>) -> Result<()> {
    match command {
        Some(command) => handle_subcommand(command),
        None => list_hotkeys(), // Default: show registered triggers
    }
}

fn handle_subcommand(command: Commands) -> Result<()> {
    match command {
        Commands::Add { trigger, expansion } => {
            let overlaps = add_hotkey(&trigger, expansion)?;
            println!("Trigger added successfully");
            if !overlaps.is_empty() {
                println!("Warning: this trigger overlaps with existing ones and may expand unreliably:");
                for existing in overlaps {
                    println!("  • {}", existing);
                }
            }
            Ok(())
        }
        Commands::Delete { trigger } => {
            delete_hotkey(&trigger).map(|_| println!("Trigger deleted successfully"))
        }
        Commands::Update { trigger, expansion } => {
            update_hotkey(&trigger, expansion).map(|_| println!("Trigger updated successfully"))
        }
        Commands::List => list_hotkeys(),
        Commands::Import { path } => {
            let summary = import_hotkeys(&path)?;
            println!(
                "Imported {} trigger(s), skipped {} invalid entr{}",
                summary.imported,
                summary.skipped,
                if summary.skipped == 1 { "y" } else { "ies" }
            );
            Ok(())
        }
        Commands::Export { path } => {
            let count = export_hotkeys(&path)?;
            println!("Exported {} trigger(s) to {}", count, path.display());
            Ok(())
        }
        Commands::Config {
            cooldown,
            paste_delay,
        } => handle_config(cooldown, paste_delay),
        Commands::Start { foreground } => start_daemon(foreground),
        Commands::Stop => stop_daemon(),
        Commands::Status => daemon_status(),
        Commands::Pause => set_paused(true),
        Commands::Resume => set_paused(false),
    }
}

fn list_hotkeys() -> Result<()> {
    let hotkeys = load_hotkeys()?;
    if hotkeys.is_empty() {
        println!("No triggers registered. Add one with `keyflow add -t <trigger> -e <text>`.");
        return Ok(());
    }

    let width = hotkeys.keys().map(|t| t.chars().count()).max().unwrap_or(0);
    for (trigger, expansion) in &hotkeys {
        // Show multi-line expansions on one line
        let preview = expansion.replace('\n', "⏎");
        println!("{:<width$}  {}", trigger, preview, width = width);
    }
    Ok(())
}

fn handle_config(cooldown: Option<f64>, paste_delay: Option<f64>) -> Result<()> {
    let mut settings = load_settings()?;

    if cooldown.is_none() && paste_delay.is_none() {
        println!("cooldown:    {}s", settings.cooldown);
        println!("paste delay: {}s", settings.paste_delay);
        return Ok(());
    }

    if let Some(cooldown) = cooldown {
        settings.cooldown = settings_seconds(cooldown);
    }
    if let Some(paste_delay) = paste_delay {
        settings.paste_delay = settings_seconds(paste_delay);
    }
    save_settings(&settings)?;
    println!("Settings saved");
    Ok(())
}

/// Clamp a seconds value the same way the engine will.
fn settings_seconds(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}
