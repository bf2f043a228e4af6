//! Writes exported message lists to disk.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use serde_json::Value;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Timestamp part of default export file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// `<channel_id>_<YYYY-MM-DD_HH:MM:SS>.json`
pub fn default_output_name<Tz>(channel_id: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{}_{}.json", channel_id, now.format(TIMESTAMP_FORMAT))
}

/// Resolve where an export goes: the explicit path, else the default
/// name inside `output_dir` (or the working directory).
pub fn resolve_output_path<Tz>(
    explicit: Option<&Path>,
    output_dir: Option<&Path>,
    channel_id: &str,
    now: &DateTime<Tz>,
) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let name = default_output_name(channel_id, now);
            match output_dir {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            }
        }
    }
}

/// Write messages as one compact JSON array.
pub fn write_messages(path: &Path, messages: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory: {}", parent.display()))?;
    }

    let file =
        File::create(path).with_context(|| format!("Cannot create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, messages)
        .with_context(|| format!("Cannot write messages to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
