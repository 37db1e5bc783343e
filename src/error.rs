// src/error.rs
use thiserror::Error;

/// Failures surfaced by the import flow. Only the first two ever reach the
/// user; parse failures are swallowed by the flow and merely logged.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unsupported file type: must be csv, xlsx, or sav")]
    UnsupportedFileType,

    #[error("Skip rows must be a number")]
    InvalidSkipRows,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Failures from the tabular parser entry points.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed delimited file: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not read workbook: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("workbook has no sheet named {0:?}")]
    SheetNotFound(String),

    #[error("malformed SPSS file: {0}")]
    Sav(#[from] crate::spss::SavError),
}
