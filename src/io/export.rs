//! Summary artifact and result exports.
//!
//! The monthly summary is written the way Brazilian spreadsheets expect it:
//! `;` between fields, `,` as decimal separator, header `month;total_value`.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    CorrelationMatrix, MonthlySummary, MonthlyTotal, QueryParameters, SegmentAssetCount, SegmentSummary,
};
use crate::error::AppError;
use crate::io::ingest::parse_decimal;

pub const SUMMARY_HEADER: [&str; 2] = ["month", "total_value"];
pub const PLACEHOLDER_FILE_NAME: &str = "erro_dados.csv";
const PLACEHOLDER_HEADER: &str = "Erro";
const PLACEHOLDER_MESSAGE: &str = "Nenhum dado para download.";

/// `2 decimals, comma separator, no grouping` (so the value stays machine-readable).
pub fn decimal_comma(v: f64) -> String {
    format!("{v:.2}").replace('.', ",")
}

fn semicolon_writer<W: Write>(w: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(b';').from_writer(w)
}

fn write_summary<W: Write>(w: W, summary: &MonthlySummary) -> Result<(), csv::Error> {
    let mut writer = semicolon_writer(w);
    writer.write_record(SUMMARY_HEADER)?;
    for r in &summary.rows {
        writer.write_record([r.month.name().to_string(), decimal_comma(r.total_value)])?;
    }
    writer.flush()?;
    Ok(())
}

/// Persist the monthly summary, replacing any existing file.
///
/// The content goes to a sibling temporary file first and is renamed into
/// place, so a failed write never leaves a truncated artifact behind.
pub fn save_summary_csv(path: &Path, summary: &MonthlySummary) -> Result<(), AppError> {
    let tmp = tmp_path(path);
    let file = File::create(&tmp)
        .map_err(|e| AppError::new(2, format!("Failed to create summary CSV '{}': {e}", tmp.display())))?;

    if let Err(e) = write_summary(file, summary) {
        let _ = fs::remove_file(&tmp);
        return Err(AppError::new(2, format!("Failed to write summary CSV: {e}")));
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::new(2, format!("Failed to move summary CSV into '{}': {e}", path.display()))
    })?;

    info!("Monthly summary saved to {}", path.display());
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "summary.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a summary artifact written by [`save_summary_csv`].
pub fn read_summary_csv(path: &Path) -> Result<MonthlySummary, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open summary CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read summary CSV header: {e}")))?
        .clone();
    let header: Vec<&str> = headers.iter().map(|h| h.trim_start_matches('\u{feff}')).collect();
    if header != SUMMARY_HEADER {
        return Err(AppError::new(
            2,
            format!("Unexpected summary CSV header {:?}; expected 'month;total_value'.", header),
        ));
    }

    let mut rows: Vec<MonthlyTotal> = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| AppError::new(2, format!("Summary CSV line {line}: {e}")))?;
        let month_raw = record.get(0).unwrap_or_default();
        let value_raw = record.get(1).unwrap_or_default();

        let month = crate::domain::Month::from_name(month_raw)
            .ok_or_else(|| AppError::new(2, format!("Summary CSV line {line}: unknown month '{month_raw}'.")))?;
        let total_value = parse_decimal(value_raw)
            .map_err(|e| AppError::new(2, format!("Summary CSV line {line}: {e}")))?;

        if rows.iter().any(|r| r.month == month) {
            return Err(AppError::new(2, format!("Summary CSV line {line}: duplicate month '{month}'.")));
        }
        rows.push(MonthlyTotal { month, total_value });
    }

    rows.sort_by_key(|r| r.month);
    Ok(MonthlySummary { rows })
}

/// Write the per-segment table; an absent previous value is an empty cell.
pub fn write_segments_csv(path: &Path, summary: &SegmentSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create segment CSV '{}': {e}", path.display())))?;
    let mut writer = semicolon_writer(file);

    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write segment CSV: {e}"));
    writer
        .write_record(["month", "segment", "total_value", "previous_value"])
        .map_err(write_err)?;
    for r in &summary.rows {
        writer
            .write_record([
                r.month.name().to_string(),
                r.segment.clone(),
                decimal_comma(r.total_value),
                r.previous_value.map(decimal_comma).unwrap_or_default(),
            ])
            .map_err(write_err)?;
    }
    writer.flush().map_err(|e| AppError::new(2, format!("Failed to flush segment CSV: {e}")))?;
    Ok(())
}

/// Full run as JSON, for archiving or downstream scripts.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub tool: &'static str,
    pub generated_at: String,
    pub query: &'a QueryParameters,
    pub monthly: &'a MonthlySummary,
    pub segments: &'a SegmentSummary,
    pub correlation: Option<&'a CorrelationMatrix>,
    pub asset_counts: &'a [SegmentAssetCount],
}

pub fn write_report_json(path: &Path, report: &RunReport<'_>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

/// A file handed to the user by the dashboard's download action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFile {
    pub file_name: String,
    pub contents: String,
}

/// Serialize the summary for download, or a one-row placeholder when there is none.
pub fn render_download(summary: Option<&MonthlySummary>, file_name: &str) -> DownloadFile {
    match summary.filter(|s| !s.is_empty()) {
        Some(summary) => {
            let mut buf = Vec::new();
            match write_summary(&mut buf, summary) {
                Ok(()) => DownloadFile {
                    file_name: file_name.to_string(),
                    contents: String::from_utf8_lossy(&buf).into_owned(),
                },
                Err(e) => {
                    warn!("Failed to serialize summary for download: {e}");
                    placeholder_download()
                }
            }
        }
        None => {
            warn!("Download requested with no data available");
            placeholder_download()
        }
    }
}

fn placeholder_download() -> DownloadFile {
    DownloadFile {
        file_name: PLACEHOLDER_FILE_NAME.to_string(),
        contents: format!("{PLACEHOLDER_HEADER}\n{PLACEHOLDER_MESSAGE}\n"),
    }
}

/// Write a download into `dir` and return its path.
pub fn write_download(dir: &Path, download: &DownloadFile) -> Result<PathBuf, AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create download dir '{}': {e}", dir.display())))?;
    let path = dir.join(&download.file_name);
    fs::write(&path, download.contents.as_bytes())
        .map_err(|e| AppError::new(2, format!("Failed to write download '{}': {e}", path.display())))?;
    info!("Download written to {}", path.display());
    Ok(path)
}
