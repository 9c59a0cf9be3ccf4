use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::model::{ReportConfig, ReportType};

// ======================================================
// FILE NAMES
// ======================================================

/// `<account-or-provider>-<category>-<frequency|YYYY-MM>-<YYYY-MM-DD>.<ext>`
pub fn report_filename(config: &ReportConfig, generated_at: &DateTime<Utc>, ext: &str) -> String {
    let category = match config.report_type {
        Some(ReportType::Billing) => "billing",
        _                         => "utilization",
    };
    let scope = match (config.report_type, config.billing_period) {
        (Some(ReportType::Billing), Some(period)) => period.to_string(),
        _ => config.frequency.to_string(),
    };

    format!(
        "{}-{}-{}-{}.{}",
        sanitize(&config.owner_label()),
        category,
        scope,
        generated_at.format("%Y-%m-%d"),
        ext
    )
}

/// Keep file names portable: anything outside `[A-Za-z0-9._-]` becomes `_`.
fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "report".to_string()
    } else {
        cleaned
    }
}

// ======================================================
// ATOMIC WRITE
// ======================================================

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Write `bytes` to `path` via a sibling `.part` file and a rename.
/// On failure the part file is removed and `path` is left untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let part = part_path(path);
    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&part)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&part, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&part);
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = bytes.len(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BillingPeriod, CloudProvider, Credentials, ReportFrequency};
    use chrono::TimeZone;

    fn config(report_type: ReportType, account: Option<&str>) -> ReportConfig {
        ReportConfig {
            provider:       CloudProvider::Azure,
            report_type:    Some(report_type),
            credentials:    Credentials::new("key", "secret", account),
            instances:      Vec::new(),
            rds_instances:  Vec::new(),
            frequency:      ReportFrequency::Weekly,
            billing_period: Some(BillingPeriod::new(2025, 3).unwrap()),
        }
    }

    #[test]
    fn filename_uses_frequency_or_period() {
        let at = Utc.with_ymd_and_hms(2025, 4, 2, 9, 30, 0).unwrap();
        assert_eq!(
            report_filename(&config(ReportType::Utilization, None), &at, "pdf"),
            "azure-utilization-weekly-2025-04-02.pdf"
        );
        assert_eq!(
            report_filename(&config(ReportType::Billing, Some("acme prod/1")), &at, "json"),
            "acme_prod_1-billing-2025-03-2025-04-02.json"
        );
    }

    #[test]
    fn atomic_write_replaces_content_and_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.pdf");
        write_atomic(&path, b"%PDF-1.3 first").unwrap();
        write_atomic(&path, b"%PDF-1.3 second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.3 second");
        assert!(!part_path(&path).exists());
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        // The target is an existing directory, so the final rename fails.
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(write_atomic(&path, b"%PDF").is_err());
        assert!(!part_path(&path).exists());
        assert!(path.is_dir());
    }
}
