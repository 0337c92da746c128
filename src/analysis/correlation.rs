//! Per-entity Pearson correlation between two tables, over the entities and
//! period labels they share.

use super::stats::pearson;
use crate::table::Table;
use arrow::array::Array;
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};
use tracing::{debug, info};

/// One entity's correlation, or a marker that there was not enough to compute one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    Coefficient(f64),
    InsufficientData,
}

impl Correlation {
    pub fn coefficient(&self) -> Option<f64> {
        match self {
            Correlation::Coefficient(r) => Some(*r),
            Correlation::InsufficientData => None,
        }
    }
}

impl Serialize for Correlation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Correlation::Coefficient(r) => serializer.serialize_f64(*r),
            Correlation::InsufficientData => serializer.serialize_str("insufficient"),
        }
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correlation::Coefficient(r) => write!(f, "{:.2}", r),
            Correlation::InsufficientData => write!(f, "Insufficient data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelationResult {
    /// The shared period labels every coefficient was computed over, sorted.
    pub periods: Vec<String>,
    pub entries: BTreeMap<String, Correlation>,
}

impl CorrelationResult {
    pub fn get(&self, entity: &str) -> Option<Correlation> {
        self.entries.get(entity).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest coefficient first; insufficient-data entities last, by name.
    pub fn ranked(&self) -> Vec<(&str, Correlation)> {
        let mut ranked: Vec<(&str, Correlation)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        ranked.sort_by(|(ka, a), (kb, b)| match (a.coefficient(), b.coefficient()) {
            (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| ka.cmp(kb)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => ka.cmp(kb),
        });
        ranked
    }

    /// One `"<entity>: <coefficient>"` line per entity, in ranked order.
    pub fn render_ranking(&self) -> String {
        self.ranked()
            .into_iter()
            .map(|(entity, c)| format!("{}: {}\n", entity, c))
            .collect()
    }
}

/// Period labels present in both tables, sorted as strings.
pub fn common_periods(a: &Table, b: &Table) -> Vec<String> {
    let theirs: HashSet<&str> = b.period_labels().into_iter().collect();
    let mut common: Vec<String> = a
        .period_labels()
        .into_iter()
        .filter(|l| theirs.contains(l))
        .map(str::to_string)
        .collect();
    common.sort();
    common
}

/// Correlate `a` against `b` per entity present in both.
///
/// Entities in only one table are left out entirely. Entities with fewer than
/// two aligned points, or a constant series on either side, get
/// [`Correlation::InsufficientData`].
#[tracing::instrument(level = "info", skip_all, fields(a = %a.name(), b = %b.name()))]
pub fn correlate(a: &Table, b: &Table) -> CorrelationResult {
    let periods = common_periods(a, b);
    let entities: Vec<&str> = a.keys().filter(|k| b.contains(k)).collect();
    info!(
        entities = entities.len(),
        periods = periods.len(),
        "aligned tables"
    );

    let cols_a: Vec<_> = periods.iter().filter_map(|p| a.column(p)).collect();
    let cols_b: Vec<_> = periods.iter().filter_map(|p| b.column(p)).collect();

    let entries: BTreeMap<String, Correlation> = entities
        .into_par_iter()
        .filter_map(|entity| {
            let (ra, rb) = (a.row_index(entity)?, b.row_index(entity)?);
            let (xs, ys): (Vec<f64>, Vec<f64>) = cols_a
                .iter()
                .zip(&cols_b)
                .filter(|(ca, cb)| ca.is_valid(ra) && cb.is_valid(rb))
                .map(|(ca, cb)| (ca.value(ra), cb.value(rb)))
                .unzip();

            let value = match pearson(&xs, &ys) {
                Some(r) => Correlation::Coefficient(r),
                None => {
                    debug!(entity, points = xs.len(), "not enough to correlate");
                    Correlation::InsufficientData
                }
            };
            Some((entity.to_string(), value))
        })
        .collect();

    CorrelationResult { periods, entries }
}
