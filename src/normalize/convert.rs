use crate::error::{PipelineError, Result};
use std::num::ParseFloatError;

/// Parse one cell after stripping thousands separators.
/// Empty cells and `NaN` come back as `None`; anything else unparsable is an error.
pub fn parse_numeric_cell(raw: &str) -> std::result::Result<Option<f64>, ParseFloatError> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(None);
    }
    cleaned.parse::<f64>().map(|v| (!v.is_nan()).then_some(v))
}

/// Coerce a whole column of string cells into `f64`s.
/// `keys[i]` names the row of `cells[i]` for the error message.
pub fn coerce_column(column: &str, keys: &[&str], cells: &[&str]) -> Result<Vec<Option<f64>>> {
    keys.iter()
        .zip(cells)
        .map(|(key, cell)| {
            parse_numeric_cell(cell).map_err(|_| PipelineError::DataType {
                row_key: key.to_string(),
                column: column.to_string(),
                value: cell.to_string(),
            })
        })
        .collect()
}
