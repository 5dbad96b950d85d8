use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Schedule file missing, unreadable, or missing required columns.
    #[error("schedule data unavailable at {}: {reason}", .path.display())]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("failed to fetch {subject} from {url} after {attempts} attempts: {reason}")]
    FetchFailure {
        subject: String,
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("malformed catalog block #{index}: {reason}")]
    MalformedCatalogBlock { index: usize, reason: String },

    #[error("course {tag} has non-numeric level {number:?}")]
    ClassificationParse { tag: String, number: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("xlsx: {0}")]
    Xlsx(#[from] umya_spreadsheet::writer::xlsx::XlsxError),

    #[error("xlsx: {0}")]
    Sheet(String),
}
