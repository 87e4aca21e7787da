use std::path::{Path, PathBuf};

use harvest_core::{DateWindow, EmailRecord};

use crate::persist::{AtomicFileWriter, PersistError};

const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// `emails_{start}_{end}.csv`, with `all` standing in for an open bound.
pub fn export_filename(window: &DateWindow) -> String {
    let (start, end) = window.labels();
    format!("emails_{start}_{end}.csv")
}

/// Render `email,created_at` rows in the order given.
pub fn render_emails_csv(emails: &[EmailRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["email", "created_at"])?;
    for email in emails {
        let created_at = email.created_at.format(CREATED_AT_FORMAT).to_string();
        writer.write_record([email.address.as_str(), created_at.as_str()])?;
    }
    writer.into_inner().map_err(|err| ExportError::Io(err.into_error()))
}

/// Write the emails of one query into `dir`, replacing an earlier export of the same window.
pub fn export_emails_csv(
    dir: &Path,
    window: &DateWindow,
    emails: &[EmailRecord],
) -> Result<PathBuf, ExportError> {
    let content = render_emails_csv(emails)?;
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    Ok(writer.write(&export_filename(window), &content)?)
}
