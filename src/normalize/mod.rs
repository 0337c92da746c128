// src/normalize/mod.rs
pub mod convert;

use crate::error::{PipelineError, Result};
use crate::load::RawTable;
use crate::table::Table;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use convert::coerce_column;

/// Entity-key column name used when none is configured.
pub const DEFAULT_KEY_LABEL: &str = "State";

/// Margin-of-error and annotation columns: any parenthesis, or `nan` in any case.
static ANNOTATION_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[()]|nan").expect("annotation column pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Canonical entity-key column name.
    pub key_label: String,
    /// Metadata columns dropped by (original) name. Absent ones are ignored.
    pub drop_columns: Vec<String>,
    /// Original name → new name.
    pub rename: BTreeMap<String, String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            key_label: DEFAULT_KEY_LABEL.into(),
            drop_columns: Vec::new(),
            rename: BTreeMap::new(),
        }
    }
}

impl NormalizeOptions {
    /// Settings for the metro home-value export: region metadata out, `RegionName` becomes the key.
    pub fn home_values() -> Self {
        Self {
            key_label: DEFAULT_KEY_LABEL.into(),
            drop_columns: ["RegionID", "SizeRank", "RegionType", "StateName"]
                .into_iter()
                .map(String::from)
                .collect(),
            rename: BTreeMap::from([(
                "RegionName".to_string(),
                DEFAULT_KEY_LABEL.to_string(),
            )]),
        }
    }
}

/// True for column names that never carry observations.
/// Blank header cells count as unnamed annotation columns.
pub fn is_annotation_column(name: &str) -> bool {
    name.trim().is_empty() || ANNOTATION_COLUMN.is_match(name)
}

fn cell(row: &[String], i: usize) -> &str {
    row.get(i).map(String::as_str).unwrap_or("")
}

/// Turn a [`RawTable`] into a [`Table`] holding only the entity key and numeric columns.
///
/// Rows with any empty cell left after coercion are dropped, so the row count can shrink.
/// Duplicate column names and duplicate entity keys keep their first occurrence.
#[tracing::instrument(level = "info", skip_all, fields(source = %raw.source))]
pub fn normalize_table(raw: &RawTable, opts: &NormalizeOptions) -> Result<Table> {
    let dropped: HashSet<&str> = opts.drop_columns.iter().map(String::as_str).collect();
    let renamed: Vec<&str> = raw
        .headers
        .iter()
        .map(|h| opts.rename.get(h).map(String::as_str).unwrap_or(h.as_str()))
        .collect();

    let key_idx = raw
        .headers
        .iter()
        .zip(&renamed)
        .position(|(orig, name)| *name == opts.key_label && !dropped.contains(orig.as_str()))
        .ok_or_else(|| PipelineError::MalformedInput {
            source_name: raw.source.clone(),
            header_label: opts.key_label.clone(),
        })?;

    // 1) pick the numeric columns
    let mut seen: HashSet<&str> = HashSet::from([opts.key_label.as_str()]);
    let mut kept: Vec<(usize, &str)> = Vec::new();
    for (i, original) in raw.headers.iter().enumerate() {
        if i == key_idx {
            continue;
        }
        let name = renamed[i];
        if dropped.contains(original.as_str()) {
            debug!(column = %original, "dropping metadata column");
            continue;
        }
        if is_annotation_column(name) {
            debug!(column = %name, "dropping annotation column");
            continue;
        }
        if !seen.insert(name) {
            warn!(column = %name, "duplicate column name, keeping the first");
            continue;
        }
        kept.push((i, name));
    }

    // 2) coerce every kept column; any bad cell fails the whole table
    let keys: Vec<&str> = raw.rows.iter().map(|r| cell(r, key_idx)).collect();
    let mut columns: Vec<(&str, Vec<Option<f64>>)> = Vec::with_capacity(kept.len());
    for &(i, name) in &kept {
        let cells: Vec<&str> = raw.rows.iter().map(|r| cell(r, i)).collect();
        columns.push((name, coerce_column(name, &keys, &cells)?));
    }

    // 3) keep complete rows with a fresh key
    let mut seen_keys: HashSet<&str> = HashSet::new();
    let mut retained: Vec<usize> = Vec::with_capacity(keys.len());
    for (row, &key) in keys.iter().enumerate() {
        if key.is_empty() || columns.iter().any(|(_, vals)| vals[row].is_none()) {
            continue;
        }
        if !seen_keys.insert(key) {
            warn!(entity = %key, "duplicate entity key, keeping the first row");
            continue;
        }
        retained.push(row);
    }

    let dropped_rows = keys.len() - retained.len();
    if dropped_rows > 0 {
        info!(dropped_rows, "dropped incomplete or duplicate rows");
    }

    let out_keys: Vec<String> = retained.iter().map(|&r| keys[r].to_string()).collect();
    let out_columns: Vec<(String, Vec<Option<f64>>)> = columns
        .into_iter()
        .map(|(name, vals)| {
            (
                name.to_string(),
                retained.iter().map(|&r| vals[r]).collect(),
            )
        })
        .collect();

    info!(
        rows = out_keys.len(),
        columns = out_columns.len(),
        "normalized table"
    );
    Table::try_new(raw.source.clone(), &opts.key_label, out_keys, out_columns)
}
