//! Collapse fine-grained (monthly) period columns into coarse (yearly) means.

use crate::analysis::stats::mean;
use crate::error::Result;
use crate::table::{
    period::{classify, coarse_prefix, PeriodLabel},
    Table,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What to do with period columns that carry no separator (already coarse).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoarseColumns {
    /// Leave them out of the output.
    Drop,
    /// Keep them, grouped under their own label.
    #[default]
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    pub separator: char,
    pub coarse_columns: CoarseColumns,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            separator: '-',
            coarse_columns: CoarseColumns::default(),
        }
    }
}

/// Average every group of columns sharing a prefix (the text before the first separator).
///
/// Output columns come in first-seen prefix order; rows and the key column are unchanged.
#[tracing::instrument(level = "info", skip_all, fields(table = %table.name()))]
pub fn aggregate_yearly(table: &Table, opts: &AggregateOptions) -> Result<Table> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut undated: Vec<&str> = Vec::new();

    for (col, label) in table.period_labels().into_iter().enumerate() {
        let prefix = match coarse_prefix(label, opts.separator) {
            Some(prefix) => {
                if classify(label) == PeriodLabel::Other {
                    undated.push(label);
                }
                prefix
            }
            None if opts.coarse_columns == CoarseColumns::PassThrough => label,
            None => {
                debug!(column = %label, "no separator, excluded from aggregation");
                continue;
            }
        };
        let slot = *index.entry(prefix.to_string()).or_insert_with(|| {
            groups.push((prefix.to_string(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(col);
    }

    if !undated.is_empty() {
        warn!(labels = ?undated, "some period labels are not valid dates");
    }

    let rows: Vec<Vec<Option<f64>>> = (0..table.num_rows()).map(|r| table.row_values(r)).collect();
    let columns: Vec<(String, Vec<Option<f64>>)> = groups
        .into_iter()
        .map(|(label, members)| {
            let values = rows
                .iter()
                .map(|row| mean(members.iter().filter_map(|&c| row[c])))
                .collect();
            (label, values)
        })
        .collect();

    info!(
        from = table.num_periods(),
        to = columns.len(),
        "aggregated period columns"
    );
    Table::try_new(
        table.name(),
        table.key_label(),
        table.keys().map(str::to_string).collect(),
        columns,
    )
}
