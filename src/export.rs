use crate::engine::GenerationReport;
use crate::error::Result;
use chrono::NaiveDateTime;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

pub fn output_file_name(timestamp: NaiveDateTime, measure_code: &str) -> String {
    format!("{}_output_{}.json", timestamp.format("%Y%m%d_%H%M%S"), measure_code)
}

/// Writes one pretty-printed JSON file per document into `dir`.
pub fn write_documents(
    dir: &Path,
    report: &GenerationReport,
    timestamp: NaiveDateTime,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(report.documents.len());
    for (measure_code, document) in &report.documents {
        let path = dir.join(output_file_name(timestamp, measure_code));
        fs::write(&path, document.to_json()?)?;
        written.push(path);
    }

    info!("Wrote {} document(s) to {}", written.len(), dir.display());
    Ok(written)
}
