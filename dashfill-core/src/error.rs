//! Error types for the transcription pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading rounds, matching metrics or writing the dashboard
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("no round workbooks starting with '{prefix}' found in {}", dir.display())]
    NoRoundFiles { dir: PathBuf, prefix: String },

    #[error("sheet '{sheet}' not found in {}", workbook.display())]
    MissingSheet { sheet: String, workbook: PathBuf },

    #[error("firm block '{label}' not found in sheet '{sheet}'")]
    MissingFirmBlock { label: String, sheet: String },

    #[error("unsupported workbook format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to read workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("malformed worksheet XML: {0}")]
    MalformedXml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Whether the error must abort the whole run instead of skipping one unit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::MissingFile { .. }
                | Error::NoRoundFiles { .. }
                | Error::UnsupportedFormat { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
