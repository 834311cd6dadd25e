//! CSV History Export

use chrono::SecondsFormat;

use crate::model::Bin;
use crate::ExportError;

/// Header row of an exported history
pub const CSV_HEADER: [&str; 5] = [
    "Timestamp",
    "Date",
    "Time",
    "Distance (cm)",
    "Fill Percentage (%)",
];

/// Download name for a bin's history, e.g. `Kitchen_Main_history.csv`
pub fn export_file_name(bin: &Bin) -> String {
    let mut stem = String::with_capacity(bin.name.len());
    let mut in_space = false;
    for ch in bin.name.chars() {
        if ch.is_whitespace() {
            // One underscore per whitespace run
            if !in_space {
                stem.push('_');
            }
            in_space = true;
        } else {
            stem.push(ch);
            in_space = false;
        }
    }
    format!("{}_history.csv", stem)
}

/// Render a bin's readings, oldest first, one row per reading
pub fn export_history_csv(bin: &Bin) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for reading in &bin.history {
        writer.write_record([
            reading.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            reading.timestamp.format("%Y-%m-%d").to_string(),
            reading.timestamp.format("%H:%M:%S").to_string(),
            format!("{:.2}", reading.distance_cm),
            format!("{:.2}", f64::from(reading.fill_percentage)),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
