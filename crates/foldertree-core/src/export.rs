/// Export of computed folder sizes to CSV or JSON.
///
/// Rows are always ordered largest first (ties by path), the same order
/// [`SizeTable::sorted_desc`] produces.
use crate::error::ExportError;
use crate::model::size::format_size;
use crate::model::SizeTable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Export format, chosen from a file extension when not given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// `.json` selects JSON; anything else is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

#[derive(Debug, Serialize)]
struct FolderRow<'a> {
    path: &'a str,
    bytes: u64,
    size: String,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    root: Option<&'a str>,
    generated_at: DateTime<Utc>,
    folders: Vec<FolderRow<'a>>,
}

fn rows(table: &SizeTable) -> Vec<(String, u64)> {
    table
        .sorted_desc()
        .into_iter()
        .map(|(path, bytes)| (path.to_string_lossy().into_owned(), bytes))
        .collect()
}

/// Write `path,bytes,size` rows with a header line.
pub fn write_csv<W: Write>(table: &SizeTable, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (path, bytes) in rows(table) {
        wtr.serialize(FolderRow {
            path: &path,
            bytes,
            size: format_size(bytes),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a pretty-printed JSON report.
pub fn write_json<W: Write>(
    table: &SizeTable,
    root: Option<&Path>,
    writer: W,
) -> Result<(), ExportError> {
    let rows = rows(table);
    let root = root.map(|r| r.to_string_lossy().into_owned());
    let report = JsonReport {
        root: root.as_deref(),
        generated_at: Utc::now(),
        folders: rows
            .iter()
            .map(|(path, bytes)| FolderRow {
                path,
                bytes: *bytes,
                size: format_size(*bytes),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(writer, &report)?;
    Ok(())
}

/// Export to `dest`, picking the format from its extension.
pub fn export_to_file(
    table: &SizeTable,
    root: Option<&Path>,
    dest: &Path,
) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(dest);
    let mut out = BufWriter::new(File::create(dest)?);
    match format {
        ExportFormat::Csv => write_csv(table, &mut out)?,
        ExportFormat::Json => write_json(table, root, &mut out)?,
    }
    out.flush()?;
    info!(
        "Exported {} folders to {} ({format:?})",
        table.len(),
        dest.display()
    );
    Ok(format)
}
