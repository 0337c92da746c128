// src/load/mod.rs
pub mod utils;

use crate::error::{PipelineError, Result};
use csv::ReaderBuilder;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use utils::{clean_str, strip_bom};

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Where the rows came from, for diagnostics.
    pub source: String,
    /// Column names, from the header row. The first one is the entity key.
    pub headers: Vec<String>,
    /// Each data row, as a Vec of cleaned Strings padded to `headers.len()`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn key_label(&self) -> Option<&str> {
        self.headers.first().map(String::as_str)
    }
}

/// Scanner state while walking the input top-to-bottom.
enum ScanState {
    SeekingHeader { skipped: usize },
    InData { headers: Vec<String> },
}

/// Open `path` and parse it with [`read_table`].
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_table<P: AsRef<Path>>(path: P, header_label: &str) -> Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_table(
        BufReader::new(file),
        &path.display().to_string(),
        header_label,
    )
}

/// Parse delimited text into a [`RawTable`]:
/// - Rows before the first row whose first cell equals `header_label` are discarded.
/// - That row becomes the column names and is not kept as data.
/// - Lines the CSV reader rejects, and data rows with non-empty cells past the header, are skipped.
///   Empty overflow cells are trimmed.
/// - Rows with an empty entity-key cell are dropped; short rows are padded with empty cells.
pub fn read_table<R: Read>(reader: R, source_name: &str, header_label: &str) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // junk rows above the header have arbitrary widths
        .from_reader(reader);

    let mut state = ScanState::SeekingHeader { skipped: 0 };
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut malformed = 0usize;

    for (idx, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) if e.is_io_error() => {
                let source = match e.into_kind() {
                    csv::ErrorKind::Io(io) => io,
                    other => std::io::Error::other(format!("{:?}", other)),
                };
                return Err(PipelineError::Io {
                    path: PathBuf::from(source_name),
                    source,
                });
            }
            Err(e) => {
                warn!(source = source_name, record = idx, "skipping malformed line: {}", e);
                malformed += 1;
                continue;
            }
        };

        match &mut state {
            ScanState::SeekingHeader { skipped } => {
                let first = record.get(0).map(|c| clean_str(strip_bom(c)));
                if first.as_deref() == Some(header_label) {
                    let headers: Vec<String> = record.iter().map(clean_str).collect();
                    debug!(
                        source = source_name,
                        skipped = *skipped,
                        columns = headers.len(),
                        "header found"
                    );
                    state = ScanState::InData { headers };
                } else {
                    *skipped += 1;
                }
            }
            ScanState::InData { headers } => {
                let mut row: Vec<String> = record.iter().map(clean_str).collect();
                if row.len() > headers.len() {
                    // trailing delimiters leave empty overflow cells
                    if row[headers.len()..].iter().any(|c| !c.is_empty()) {
                        warn!(
                            source = source_name,
                            record = idx,
                            "skipping line with {} fields, expected {}",
                            row.len(),
                            headers.len()
                        );
                        malformed += 1;
                        continue;
                    }
                    row.truncate(headers.len());
                }
                if row.first().map_or(true, |k| k.is_empty()) {
                    continue;
                }
                row.resize(headers.len(), String::new());
                rows.push(row);
            }
        }
    }

    match state {
        ScanState::SeekingHeader { .. } => Err(PipelineError::MalformedInput {
            source_name: source_name.to_string(),
            header_label: header_label.to_string(),
        }),
        ScanState::InData { headers } => {
            info!(
                source = source_name,
                rows = rows.len(),
                columns = headers.len(),
                malformed,
                "loaded table"
            );
            Ok(RawTable {
                source: source_name.to_string(),
                headers,
                rows,
            })
        }
    }
}
