//! Report output
//!
//! The backend renders the spreadsheet; this side only names the file and
//! writes the bytes it receives.

use ipqc_common::{AuditRecord, RecordIdentity};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for a checksheet report
pub fn report_file_name(identity: Option<&RecordIdentity>) -> String {
    match identity {
        Some(identity) => format!(
            "IPQC_Audit_Line-{}_{}_Shift-{}.xlsx",
            identity.line,
            identity.date,
            sanitize(&identity.shift)
        ),
        None => "IPQC_Audit_draft.xlsx".to_string(),
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Write report bytes into `dir`, or to `output` when given
pub async fn write_report(
    record: &AuditRecord,
    bytes: &[u8],
    dir: &Path,
    output: Option<&Path>,
) -> std::io::Result<PathBuf> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => dir.join(report_file_name(record.identity().as_ref())),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    info!(path = %path.display(), bytes = bytes.len(), "Wrote audit report");
    Ok(path)
}
