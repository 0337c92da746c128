// src/table/mod.rs
pub mod period;

use crate::error::{PipelineError, Result};
use crate::load::RawTable;
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::{collections::HashSet, sync::Arc};

/// A normalized table: a Utf8 entity-key column followed by Float64 period columns.
///
/// Keys are unique and column names are unique; both are checked on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    batch: RecordBatch,
    keys: StringArray,
    columns: Vec<Float64Array>,
}

impl Table {
    /// Build from column-major data. `columns` are `(period label, values)` with one value per key.
    pub fn try_new(
        name: impl Into<String>,
        key_label: &str,
        keys: Vec<String>,
        columns: Vec<(String, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        let mut fields = Vec::with_capacity(columns.len() + 1);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len() + 1);

        fields.push(Field::new(key_label, DataType::Utf8, false));
        arrays.push(Arc::new(StringArray::from(keys)));
        for (label, values) in columns {
            fields.push(Field::new(label, DataType::Float64, true));
            arrays.push(Arc::new(Float64Array::from(values)));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Self::from_batch(name, batch)
    }

    /// Wrap an existing batch, checking the table invariants.
    pub fn from_batch(name: impl Into<String>, batch: RecordBatch) -> Result<Self> {
        if batch.num_columns() == 0 {
            return Err(ArrowError::SchemaError("table has no entity-key column".into()).into());
        }

        let keys = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .cloned()
            .ok_or_else(|| {
                ArrowError::SchemaError(format!(
                    "entity-key column '{}' must be Utf8",
                    batch.schema_ref().field(0).name()
                ))
            })?;

        let mut columns = Vec::with_capacity(batch.num_columns() - 1);
        for (i, field) in batch.schema_ref().fields().iter().enumerate().skip(1) {
            let arr = batch
                .column(i)
                .as_any()
                .downcast_ref::<Float64Array>()
                .cloned()
                .ok_or_else(|| {
                    ArrowError::SchemaError(format!("column '{}' must be Float64", field.name()))
                })?;
            columns.push(arr);
        }

        let mut seen = HashSet::new();
        for field in batch.schema_ref().fields() {
            if !seen.insert(field.name().as_str()) {
                return Err(ArrowError::InvalidArgumentError(format!(
                    "duplicate column name '{}'",
                    field.name()
                ))
                .into());
            }
        }
        let mut seen = HashSet::new();
        for key in keys.iter().flatten() {
            if !seen.insert(key) {
                return Err(
                    ArrowError::InvalidArgumentError(format!("duplicate entity key '{}'", key))
                        .into(),
                );
            }
        }

        Ok(Self {
            name: name.into(),
            batch,
            keys,
            columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn key_label(&self) -> &str {
        self.batch.schema_ref().field(0).name()
    }

    /// Labels of the period columns, in column order.
    pub fn period_labels(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .skip(1)
            .map(|f| f.name().as_str())
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_periods(&self) -> usize {
        self.columns.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.keys.iter().map(|k| k.unwrap_or_default())
    }

    pub fn row_index(&self, entity: &str) -> Option<usize> {
        self.keys().position(|k| k == entity)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.row_index(entity).is_some()
    }

    pub fn column(&self, label: &str) -> Option<&Float64Array> {
        self.batch
            .schema_ref()
            .index_of(label)
            .ok()
            .filter(|&i| i > 0)
            .map(|i| &self.columns[i - 1])
    }

    /// Values of row `row`, one per period column.
    pub fn row_values(&self, row: usize) -> Vec<Option<f64>> {
        self.columns
            .iter()
            .map(|c| (!c.is_null(row)).then(|| c.value(row)))
            .collect()
    }

    /// The row of `entity` as a yearly series. Null cells are left out as gaps.
    pub fn series(&self, entity: &str) -> Result<TimeSeries> {
        let row = self
            .row_index(entity)
            .ok_or_else(|| PipelineError::EntityNotFound {
                entity: entity.to_string(),
                table: self.name.clone(),
            })?;

        let mut points = Vec::with_capacity(self.columns.len());
        for (label, value) in self.period_labels().into_iter().zip(self.row_values(row)) {
            let period = period::parse_year(label)?;
            if let Some(v) = value {
                points.push((period, v));
            }
        }
        TimeSeries::new(entity, points)
    }
}

impl From<&Table> for RawTable {
    fn from(table: &Table) -> Self {
        let headers = std::iter::once(table.key_label())
            .chain(table.period_labels())
            .map(str::to_string)
            .collect();
        let rows = (0..table.num_rows())
            .map(|row| {
                let key = table.keys.value(row).to_string();
                std::iter::once(key)
                    .chain(
                        table
                            .row_values(row)
                            .into_iter()
                            .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
                    )
                    .collect()
            })
            .collect();
        RawTable {
            source: table.name.clone(),
            headers,
            rows,
        }
    }
}

/// One entity's `(period, value)` pairs, strictly increasing by period.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    entity: String,
    points: Vec<(i32, f64)>,
}

impl TimeSeries {
    pub fn new(entity: impl Into<String>, mut points: Vec<(i32, f64)>) -> Result<Self> {
        points.sort_by_key(|(p, _)| *p);
        if let Some(w) = points.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(PipelineError::InvalidPeriod {
                label: w[0].0.to_string(),
                reason: "period appears more than once".into(),
            });
        }
        Ok(Self {
            entity: entity.into(),
            points,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn points(&self) -> &[(i32, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn periods(&self) -> impl Iterator<Item = i32> + '_ {
        self.points.iter().map(|(p, _)| *p)
    }

    pub fn first_period(&self) -> Option<i32> {
        self.points.first().map(|(p, _)| *p)
    }

    pub fn last_period(&self) -> Option<i32> {
        self.points.last().map(|(p, _)| *p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::try_new(
            "sample",
            "State",
            vec!["Ohio".into(), "Utah".into()],
            vec![
                ("2019".into(), vec![Some(2.0), Some(20.0)]),
                ("2018".into(), vec![Some(1.0), None]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let t = sample();
        assert_eq!(t.key_label(), "State");
        assert_eq!(t.period_labels(), vec!["2019", "2018"]);
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.row_index("Utah"), Some(1));
        assert!(t.column("State").is_none());
        assert_eq!(t.column("2018").unwrap().value(0), 1.0);
        assert_eq!(t.row_values(1), vec![Some(20.0), None]);
    }

    #[test]
    fn test_series_is_sorted_and_skips_gaps() {
        let t = sample();
        let ohio = t.series("Ohio").unwrap();
        assert_eq!(ohio.points(), &[(2018, 1.0), (2019, 2.0)]);
        let utah = t.series("Utah").unwrap();
        assert_eq!(utah.points(), &[(2019, 20.0)]);
    }

    #[test]
    fn test_series_missing_entity() {
        let err = sample().series("Guam").unwrap_err();
        assert!(
            matches!(err, PipelineError::EntityNotFound { ref entity, ref table } if entity == "Guam" && table == "sample")
        );
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = Table::try_new(
            "dup",
            "State",
            vec!["Ohio".into(), "Ohio".into()],
            vec![("2019".into(), vec![Some(1.0), Some(2.0)])],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Arrow(_)));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = Table::try_new(
            "dup",
            "State",
            vec!["Ohio".into()],
            vec![
                ("2019".into(), vec![Some(1.0)]),
                ("2019".into(), vec![Some(2.0)]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Arrow(_)));
    }

    #[test]
    fn test_to_raw() {
        let raw = RawTable::from(&sample());
        assert_eq!(raw.headers, vec!["State", "2019", "2018"]);
        assert_eq!(raw.rows[1], vec!["Utah", "20", ""]);
    }
}
