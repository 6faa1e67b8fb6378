use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author = "Gokul <@bahdotsh>",
    version = env!("CARGO_PKG_VERSION"),
    about = "keyflow - A real-time text expansion engine",
    long_about = "keyflow watches your typing and replaces registered triggers with their expansions."
)]
pub struct Keyflow {
    #[clap(subcommand)]
    pub commands: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new trigger
    Add {
        #[clap(long, short = 't', help = "Trigger text (no whitespace)")]
        trigger: String,

        #[clap(long, short = 'e', help = "Text the trigger expands to")]
        expansion: String,
    },
    /// Delete a trigger
    Delete {
        #[clap(long, short = 't', help = "Trigger to delete")]
        trigger: String,
    },
    /// Change the expansion of an existing trigger
    Update {
        #[clap(long, short = 't', help = "Trigger to update")]
        trigger: String,

        #[clap(long, short = 'e', help = "New expansion text")]
        expansion: String,
    },
    /// List all triggers
    List,
    /// Merge triggers from a JSON or CSV file
    Import {
        #[clap(help = "JSON object, or .csv with Trigger/Output columns")]
        path: PathBuf,
    },
    /// Write all triggers to a JSON or CSV file
    Export {
        #[clap(help = "Destination file, written as CSV when it ends in .csv")]
        path: PathBuf,
    },
    /// Show or change timing settings
    Config {
        #[clap(long, help = "Minimum seconds between two expansions")]
        cooldown: Option<f64>,

        #[clap(long = "paste-delay", help = "Seconds to wait around each emitted keystroke")]
        paste_delay: Option<f64>,
    },
    /// Start the expansion daemon
    Start {
        #[clap(long, short, help = "Run in the foreground instead of daemonizing")]
        foreground: bool,
    },
    /// Stop the keyflow daemon
    Stop,
    /// Check the status of the keyflow daemon
    Status,
    /// Stop expanding triggers until resumed
    Pause,
    /// Resume expanding triggers
    Resume,
}
