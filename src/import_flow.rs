// src/import_flow.rs
use std::path::{Path, PathBuf};

use crate::data_types::{FileKind, ImportRequest, ImportResult, Separator, TableData};
use crate::error::ImportError;
use crate::tabular;

/// Sentinel text in the missing-values field meaning "no custom marker".
pub const NA_DEFAULT: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No file chosen yet.
    Idle,
    /// A file is chosen and its kind-specific options are editable, but no
    /// parse has succeeded for it yet.
    OptionsShown,
    /// At least one parse succeeded; the commit action is available.
    PreviewReady,
    Committed,
    Cancelled,
}

/// Parsing options, keyed by the kind of the currently selected file.
#[derive(Debug, Clone)]
pub enum ImportOptions {
    Csv {
        separator: Separator,
        na_marker: String,
    },
    Excel {
        sheet_names: Vec<String>,
        sheet_name: String,
        /// Raw field text; validated on each refresh so bad input can be
        /// reported instead of silently clamped.
        skip_rows: String,
        na_marker: String,
    },
    Spss,
}

/// Drives one import from file selection to commit or cancel. Owns all
/// transient state; holds no UI handles, so it can be exercised headless.
pub struct ImportFlow {
    state: FlowState,
    request: Option<ImportRequest>,
    options: Option<ImportOptions>,
    parsed: Option<TableData>,
    show_preview: bool,
    error: Option<ImportError>,
}

impl ImportFlow {
    pub fn new() -> Self {
        ImportFlow {
            state: FlowState::Idle,
            request: None,
            options: None,
            parsed: None,
            show_preview: true,
            error: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn request(&self) -> Option<&ImportRequest> {
        self.request.as_ref()
    }

    pub fn options(&self) -> Option<&ImportOptions> {
        self.options.as_ref()
    }

    pub fn error(&self) -> Option<&ImportError> {
        self.error.as_ref()
    }

    pub fn show_preview(&self) -> bool {
        self.show_preview
    }

    /// Display-only projection: the toggle never touches the stored table.
    pub fn set_show_preview(&mut self, show: bool) {
        self.show_preview = show;
    }

    /// The table to display, or `None` for an empty preview. Disabling the
    /// preview hides the table without discarding it.
    pub fn preview(&self) -> Option<&TableData> {
        if self.show_preview {
            self.parsed.as_ref()
        } else {
            None
        }
    }

    pub fn can_commit(&self) -> bool {
        self.state == FlowState::PreviewReady && self.parsed.is_some()
    }

    /// Handle the outcome of the file picker. `None` (dismissed picker) is a
    /// strict no-op. An unrecognized extension is reported and leaves the
    /// current request, options and preview untouched. A recognized file
    /// replaces all of them with fresh defaults and immediately refreshes.
    pub fn select_file(&mut self, picked: Option<PathBuf>) {
        let Some(path) = picked else {
            return;
        };
        let Some(kind) = FileKind::from_path(&path) else {
            self.error = Some(ImportError::UnsupportedFileType);
            return;
        };

        let options = match kind {
            FileKind::Csv => ImportOptions::Csv {
                separator: Separator::Comma,
                na_marker: NA_DEFAULT.to_string(),
            },
            FileKind::Excel => {
                // The sheet list must exist before options can be shown. An
                // unreadable workbook gets the same treatment as any other
                // parse failure: nothing changes.
                let names = match tabular::sheet_names(&path) {
                    Ok(names) if !names.is_empty() => names,
                    Ok(_) => {
                        tracing::debug!(path = %path.display(), "workbook has no sheets");
                        return;
                    }
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "could not enumerate sheets");
                        return;
                    }
                };
                ImportOptions::Excel {
                    sheet_name: names[0].clone(),
                    sheet_names: names,
                    skip_rows: "0".to_string(),
                    na_marker: NA_DEFAULT.to_string(),
                }
            }
            FileKind::Spss => ImportOptions::Spss,
        };

        self.error = None;
        self.request = Some(ImportRequest { path, kind });
        self.options = Some(options);
        self.parsed = None;
        self.state = FlowState::OptionsShown;
        self.refresh_preview();
    }

    /// Parse the current request with the current options. Invalid skip-rows
    /// input is reported; any parser failure is a silent no-op that leaves
    /// the previous preview and commit availability standing.
    pub fn refresh_preview(&mut self) {
        let (Some(request), Some(options)) = (self.request.as_ref(), self.options.as_ref()) else {
            return;
        };
        match parse(request, options) {
            Ok(table) => {
                self.parsed = Some(table);
                self.error = None;
                self.state = FlowState::PreviewReady;
            }
            Err(ImportError::Parse(err)) => {
                tracing::debug!(error = %err, "preview refresh failed; keeping previous preview");
            }
            Err(err) => {
                self.error = Some(err);
            }
        }
    }

    /// Hand back the most recently parsed table together with a name derived
    /// from the file name. `None` until a parse has succeeded.
    pub fn commit(&mut self) -> Option<ImportResult> {
        if !self.can_commit() {
            return None;
        }
        let table = self.parsed.clone()?;
        let name = self.request.as_ref().and_then(|r| derive_name(&r.path));
        self.state = FlowState::Committed;
        Some(ImportResult { table, name })
    }

    pub fn cancel(&mut self) {
        self.state = FlowState::Cancelled;
    }

    pub fn set_separator(&mut self, value: Separator) {
        if let Some(ImportOptions::Csv { separator, .. }) = self.options.as_mut() {
            *separator = value;
        }
    }

    pub fn set_na_marker(&mut self, value: String) {
        match self.options.as_mut() {
            Some(ImportOptions::Csv { na_marker, .. })
            | Some(ImportOptions::Excel { na_marker, .. }) => *na_marker = value,
            _ => {}
        }
    }

    pub fn set_sheet_name(&mut self, value: String) {
        if let Some(ImportOptions::Excel { sheet_name, .. }) = self.options.as_mut() {
            *sheet_name = value;
        }
    }

    pub fn set_skip_rows(&mut self, value: String) {
        if let Some(ImportOptions::Excel { skip_rows, .. }) = self.options.as_mut() {
            *skip_rows = value;
        }
    }
}

impl Default for ImportFlow {
    fn default() -> Self {
        ImportFlow::new()
    }
}

fn parse(request: &ImportRequest, options: &ImportOptions) -> Result<TableData, ImportError> {
    match options {
        ImportOptions::Csv {
            separator,
            na_marker,
        } => Ok(tabular::parse_delimited(
            &request.path,
            separator.as_byte(),
            na_value(na_marker),
        )?),
        ImportOptions::Excel {
            sheet_name,
            skip_rows,
            na_marker,
            ..
        } => {
            let skip = skip_rows
                .trim()
                .parse::<usize>()
                .map_err(|_| ImportError::InvalidSkipRows)?;
            Ok(tabular::parse_spreadsheet(
                &request.path,
                sheet_name,
                skip,
                na_value(na_marker),
            )?)
        }
        ImportOptions::Spss => Ok(tabular::parse_stat_package(&request.path)?),
    }
}

fn na_value(marker: &str) -> Option<&str> {
    (marker != NA_DEFAULT).then_some(marker)
}

/// File-name text before the first dot; `None` when there is no dot or
/// nothing precedes it.
fn derive_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let (stem, _) = file_name.split_once('.')?;
    (!stem.is_empty()).then(|| stem.to_string())
}
