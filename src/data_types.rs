// src/data_types.rs
use std::fmt;
use std::path::{Path, PathBuf};

/// Which kind of tabular file the user selected, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
    Spss,
}

impl FileKind {
    /// Case-insensitive extension match; `None` for anything else.
    pub fn from_path(path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(FileKind::Csv)
        } else if ext.eq_ignore_ascii_case("xlsx") {
            Some(FileKind::Excel)
        } else if ext.eq_ignore_ascii_case("sav") {
            Some(FileKind::Spss)
        } else {
            None
        }
    }
}

/// The chosen file. Immutable once built; replaced wholesale on re-selection.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// CSV field separator choices, displayed by label in the options dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Comma,
    Semicolon,
    Space,
    Tab,
}

impl Separator {
    pub const ALL: [Separator; 4] = [
        Separator::Comma,
        Separator::Semicolon,
        Separator::Space,
        Separator::Tab,
    ];

    pub fn as_byte(self) -> u8 {
        match self {
            Separator::Comma => b',',
            Separator::Semicolon => b';',
            Separator::Space => b' ',
            Separator::Tab => b'\t',
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Separator::Comma => write!(f, ","),
            Separator::Semicolon => write!(f, ";"),
            Separator::Space => write!(f, "Space"),
            Separator::Tab => write!(f, "Tab"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    pub fn empty() -> Self {
        TableData {
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// What a committed import hands back to the host window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub table: TableData,
    /// File name text before the first dot; `None` when there is no dot or
    /// nothing precedes it.
    pub name: Option<String>,
}
