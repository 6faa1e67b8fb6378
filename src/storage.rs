use crate::config::{ensure_data_dir_at, get_config_dir, HOTKEYS_FILENAME};
use crate::error::{KeyflowError, Result};
use crate::triggers::{overlapping_triggers, validate_trigger, Hotkeys};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, Trim, WriterBuilder};
use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

/// Header names accepted for the trigger column of a CSV import, in order of preference.
const CSV_TRIGGER_HEADERS: [&str; 3] = ["Trigger", "trigger", "Hotkey"];
/// Header names accepted for the expansion column of a CSV import.
const CSV_OUTPUT_HEADERS: [&str; 3] = ["Output", "output", "Text"];

/// File format used by import and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyFormat {
    /// A flat JSON object, the same layout as `hotkeys.json`
    Json,
    /// Two columns with a header row
    Csv,
}

impl HotkeyFormat {
    /// Pick the format from a file extension; anything but `.csv` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(OsStr::to_str) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => HotkeyFormat::Csv,
            _ => HotkeyFormat::Json,
        }
    }
}

/// Outcome of merging a hotkeys file into the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Parse a flat trigger to expansion JSON object.
///
/// Anything other than an object yields an empty mapping; non-string values
/// are kept in their JSON text form.
pub fn parse_hotkeys(content: &str) -> Hotkeys {
    let value: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring malformed hotkeys file: {}", e);
            return Hotkeys::new();
        }
    };

    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(trigger, value)| {
                let expansion = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (trigger, expansion)
            })
            .collect(),
        _ => {
            tracing::warn!("Hotkeys file is not a JSON object, starting empty");
            Hotkeys::new()
        }
    }
}

/// Read `(trigger, expansion)` rows from CSV.
///
/// The first non-empty value among the accepted header aliases is used for
/// each column. Cells are trimmed, and rows missing either value are dropped.
pub fn parse_hotkeys_csv(content: &str) -> Result<Vec<(String, String)>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let trigger_columns = column_positions(&headers, &CSV_TRIGGER_HEADERS);
    let output_columns = column_positions(&headers, &CSV_OUTPUT_HEADERS);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let trigger = first_value(&record, &trigger_columns);
        let output = first_value(&record, &output_columns);
        if let (Some(trigger), Some(output)) = (trigger, output) {
            rows.push((trigger.to_string(), output.to_string()));
        }
    }
    Ok(rows)
}

fn column_positions(headers: &StringRecord, aliases: &[&str]) -> Vec<usize> {
    aliases
        .iter()
        .filter_map(|alias| headers.iter().position(|header| header == *alias))
        .collect()
}

fn first_value<'r>(record: &'r StringRecord, columns: &[usize]) -> Option<&'r str> {
    columns
        .iter()
        .filter_map(|&column| record.get(column))
        .find(|value| !value.is_empty())
}

/// Render hotkeys as CSV with a `Trigger,Output` header, every field quoted
/// and CRLF line endings.
pub fn hotkeys_to_csv(hotkeys: &Hotkeys) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(["Trigger", "Output"])?;
    for (trigger, expansion) in hotkeys {
        writer.write_record([trigger, expansion])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| KeyflowError::Other(format!("Failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| KeyflowError::Other(e.to_string()))
}

/// Load all hotkeys from a data directory
pub fn load_hotkeys_at(dir: &Path) -> Result<Hotkeys> {
    ensure_data_dir_at(dir)?;
    let content = fs::read_to_string(dir.join(HOTKEYS_FILENAME))?;

    // Handle empty database file
    if content.trim().is_empty() {
        return Ok(Hotkeys::new());
    }

    Ok(parse_hotkeys(&content))
}

/// Save hotkeys to a data directory
pub fn save_hotkeys_at(dir: &Path, hotkeys: &Hotkeys) -> Result<()> {
    ensure_data_dir_at(dir)?;
    let serialized = serde_json::to_string_pretty(hotkeys)?;
    fs::write(dir.join(HOTKEYS_FILENAME), serialized)?;
    Ok(())
}

fn ensure_expansion(trigger: &str, expansion: &str) -> Result<()> {
    if expansion.is_empty() {
        return Err(KeyflowError::InvalidTrigger(format!(
            "expansion for '{}' is empty",
            trigger
        )));
    }
    Ok(())
}

/// Add a new hotkey, returning existing triggers it overlaps with.
pub fn add_hotkey_at(dir: &Path, trigger: &str, expansion: String) -> Result<Vec<String>> {
    let trigger = trigger.trim();
    validate_trigger(trigger)?;
    ensure_expansion(trigger, &expansion)?;

    let mut hotkeys = load_hotkeys_at(dir)?;
    if hotkeys.contains_key(trigger) {
        return Err(KeyflowError::TriggerExists(trigger.to_string()));
    }

    let overlaps = overlapping_triggers(&hotkeys, trigger)
        .into_iter()
        .map(str::to_string)
        .collect();

    hotkeys.insert(trigger.to_string(), expansion);
    save_hotkeys_at(dir, &hotkeys)?;
    Ok(overlaps)
}

/// Delete a hotkey by trigger
pub fn delete_hotkey_at(dir: &Path, trigger: &str) -> Result<()> {
    let mut hotkeys = load_hotkeys_at(dir)?;
    if hotkeys.remove(trigger).is_none() {
        return Err(KeyflowError::TriggerNotFound(trigger.to_string()));
    }
    save_hotkeys_at(dir, &hotkeys)
}

/// Update an existing hotkey
pub fn update_hotkey_at(dir: &Path, trigger: &str, expansion: String) -> Result<()> {
    ensure_expansion(trigger, &expansion)?;
    let mut hotkeys = load_hotkeys_at(dir)?;
    match hotkeys.get_mut(trigger) {
        Some(existing) => *existing = expansion,
        None => return Err(KeyflowError::TriggerNotFound(trigger.to_string())),
    }
    save_hotkeys_at(dir, &hotkeys)
}

/// Merge hotkeys from a JSON or CSV file, chosen by extension. Invalid or
/// empty entries are skipped; imported entries overwrite existing triggers.
pub fn import_hotkeys_at(dir: &Path, source: &Path) -> Result<ImportSummary> {
    let content = fs::read_to_string(source)?;
    let incoming: Vec<(String, String)> = match HotkeyFormat::from_path(source) {
        HotkeyFormat::Json => parse_hotkeys(&content).into_iter().collect(),
        HotkeyFormat::Csv => parse_hotkeys_csv(&content)?,
    };
    let mut hotkeys = load_hotkeys_at(dir)?;
    let mut summary = ImportSummary::default();

    for (trigger, expansion) in incoming {
        let trigger = trigger.trim().to_string();
        if validate_trigger(&trigger).is_err() || expansion.trim().is_empty() {
            summary.skipped += 1;
            continue;
        }
        hotkeys.insert(trigger, expansion);
        summary.imported += 1;
    }

    save_hotkeys_at(dir, &hotkeys)?;
    Ok(summary)
}

/// Write the stored hotkeys to `target`, as CSV for a `.csv` path and as a
/// JSON object otherwise
pub fn export_hotkeys_at(dir: &Path, target: &Path) -> Result<usize> {
    let hotkeys = load_hotkeys_at(dir)?;
    let rendered = match HotkeyFormat::from_path(target) {
        HotkeyFormat::Json => serde_json::to_string_pretty(&hotkeys)?,
        HotkeyFormat::Csv => hotkeys_to_csv(&hotkeys)?,
    };
    fs::write(target, rendered)?;
    Ok(hotkeys.len())
}

pub fn load_hotkeys() -> Result<Hotkeys> {
    load_hotkeys_at(&get_config_dir())
}

pub fn add_hotkey(trigger: &str, expansion: String) -> Result<Vec<String>> {
    add_hotkey_at(&get_config_dir(), trigger, expansion)
}

pub fn delete_hotkey(trigger: &str) -> Result<()> {
    delete_hotkey_at(&get_config_dir(), trigger)
}

pub fn update_hotkey(trigger: &str, expansion: String) -> Result<()> {
    update_hotkey_at(&get_config_dir(), trigger, expansion)
}

pub fn import_hotkeys(source: &Path) -> Result<ImportSummary> {
    import_hotkeys_at(&get_config_dir(), source)
}

pub fn export_hotkeys(target: &Path) -> Result<usize> {
    export_hotkeys_at(&get_config_dir(), target)
}
