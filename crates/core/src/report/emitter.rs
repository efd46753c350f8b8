use crate::report::ScanReport;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const LATEST_FILE: &str = "earnings_crush_latest.json";

pub fn dated_file_name(report: &ScanReport) -> String {
    format!("earnings_crush_{}.json", report.date)
}

/// Persist the report: `earnings_crush_latest.json` plus a dated copy, both
/// written via tmp-then-rename so readers never see a partial document.
/// Returns the path of the latest file.
pub fn write_report(report: &ScanReport, reports_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir)
        .with_context(|| format!("create reports dir {} failed", reports_dir.display()))?;

    let json = serde_json::to_string_pretty(report).context("serialize report failed")?;

    let latest = reports_dir.join(LATEST_FILE);
    write_atomic(&latest, &json)?;

    let dated = reports_dir.join(dated_file_name(report));
    write_atomic(&dated, &json)?;

    Ok(latest)
}

/// Mirror the latest report into the web repo's public dir, when it exists.
/// Returns `None` when the dir is absent; that is not an error.
pub fn copy_to_web_dir(report: &ScanReport, web_public_dir: &Path) -> Result<Option<PathBuf>> {
    if !web_public_dir.is_dir() {
        return Ok(None);
    }
    let json = serde_json::to_string_pretty(report).context("serialize report failed")?;
    let target = web_public_dir.join(LATEST_FILE);
    write_atomic(&target, &json)?;
    Ok(Some(target))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {} failed", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {} failed", tmp.display(), path.display()))?;
    Ok(())
}
