//! Linear trend fitting and forecasting.
//!
//! Ordinary least squares of value against period, computed on mean-centred
//! inputs so year-sized periods do not cost precision.

use crate::error::{PipelineError, Result};
use crate::table::{Table, TimeSeries};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A fitted straight line `value = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendModel {
    slope: f64,
    intercept: f64,
    r_squared: f64,
    n_observations: usize,
}

impl TrendModel {
    /// Fit against the series' periods.
    pub fn fit(series: &TimeSeries) -> Result<Self> {
        let (xs, ys): (Vec<f64>, Vec<f64>) =
            series.points().iter().map(|&(p, v)| (p as f64, v)).unzip();
        Self::fit_xy(series.entity(), &xs, &ys)
    }

    fn fit_xy(entity: &str, xs: &[f64], ys: &[f64]) -> Result<Self> {
        let n = xs.len();
        if n < 2 {
            return Err(PipelineError::InsufficientData {
                entity: entity.to_string(),
                required: 2,
                actual: n,
            });
        }

        let mean_x = xs.iter().sum::<f64>() / n as f64;
        let mean_y = ys.iter().sum::<f64>() / n as f64;
        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (x, y) in xs.iter().zip(ys) {
            sxy += (x - mean_x) * (y - mean_y);
            sxx += (x - mean_x) * (x - mean_x);
        }
        if sxx == 0.0 {
            // every point at the same x: no line through them
            return Err(PipelineError::InsufficientData {
                entity: entity.to_string(),
                required: 2,
                actual: 1,
            });
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
        let ss_res: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

        Ok(Self {
            slope,
            intercept,
            r_squared,
            n_observations: n,
        })
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Result of [`fit_and_forecast`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub entity: String,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// `actual - fitted` at every training point. This is the negation of a
    /// fitted-minus-observed residual, and matches the sign of [`TrendResult::residuals`].
    pub training_errors: Vec<(i32, f64)>,
    /// One prediction per period from the first training period through the last target.
    pub forecast: Vec<(i32, f64)>,
}

impl TrendResult {
    pub fn predict(&self, period: i32) -> f64 {
        self.intercept + self.slope * period as f64
    }

    /// `actual - predicted` for each observed period that falls inside the forecast range.
    pub fn residuals(&self, observed: &TimeSeries) -> Vec<(i32, f64)> {
        let (Some(&(start, _)), Some(&(end, _))) = (self.forecast.first(), self.forecast.last())
        else {
            return Vec::new();
        };
        observed
            .points()
            .iter()
            .filter(|(p, _)| (start..=end).contains(p))
            .map(|&(p, actual)| (p, actual - self.predict(p)))
            .collect()
    }
}

/// Fit on `training` and predict over the contiguous range from its first period
/// through the largest of `target_periods` (its own last period if none are given).
pub fn fit_and_forecast(training: &TimeSeries, target_periods: &[i32]) -> Result<TrendResult> {
    let model = TrendModel::fit(training)?;

    // fit() guarantees at least two points
    let start = training.first_period().unwrap_or_default();
    let end = target_periods
        .iter()
        .copied()
        .max()
        .or(training.last_period())
        .unwrap_or(start);

    let forecast = (start..=end)
        .map(|p| (p, model.predict(p as f64)))
        .collect();
    let training_errors = training
        .points()
        .iter()
        .map(|&(p, v)| (p, v - model.predict(p as f64)))
        .collect();

    debug!(
        entity = training.entity(),
        slope = model.slope(),
        intercept = model.intercept(),
        start,
        end,
        "fitted trend"
    );
    Ok(TrendResult {
        entity: training.entity().to_string(),
        slope: model.slope(),
        intercept: model.intercept(),
        r_squared: model.r_squared(),
        training_errors,
        forecast,
    })
}

/// A trend fitted on one table and checked against another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityForecast {
    pub entity: String,
    pub trend: TrendResult,
    /// The evaluation table's observations.
    pub actual: Vec<(i32, f64)>,
    /// `actual - predicted` per evaluation period inside the forecast range.
    pub residuals: Vec<(i32, f64)>,
}

/// Fit `entity`'s row of `training` and forecast through the last period of `evaluation`.
pub fn forecast_entity(training: &Table, evaluation: &Table, entity: &str) -> Result<EntityForecast> {
    let train = training.series(entity)?;
    let observed = evaluation.series(entity)?;
    let targets: Vec<i32> = observed.periods().collect();

    let trend = fit_and_forecast(&train, &targets)?;
    let residuals = trend.residuals(&observed);
    Ok(EntityForecast {
        entity: entity.to_string(),
        actual: observed.points().to_vec(),
        residuals,
        trend,
    })
}

/// [`forecast_entity`] for one entity, or every training entity when `selection` is `None`.
/// Each entity gets its own slot; one failing does not affect the others.
pub fn forecast_all(
    training: &Table,
    evaluation: &Table,
    selection: Option<&str>,
) -> BTreeMap<String, Result<EntityForecast>> {
    let entities: Vec<&str> = match selection {
        Some(entity) => vec![entity],
        None => training.keys().collect(),
    };
    entities
        .into_par_iter()
        .map(|entity| {
            (
                entity.to_string(),
                forecast_entity(training, evaluation, entity),
            )
        })
        .collect()
}

/// Trend over an entity's row against positional index `0..n`, for series whose
/// labels are dates rather than years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexTrend {
    pub entity: String,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub indices: Vec<usize>,
    pub observed: Vec<f64>,
    pub fitted: Vec<f64>,
}

pub fn index_trend(table: &Table, entity: &str) -> Result<IndexTrend> {
    let row = table
        .row_index(entity)
        .ok_or_else(|| PipelineError::EntityNotFound {
            entity: entity.to_string(),
            table: table.name().to_string(),
        })?;

    let (indices, observed): (Vec<usize>, Vec<f64>) = table
        .row_values(row)
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .unzip();
    let xs: Vec<f64> = indices.iter().map(|&i| i as f64).collect();
    let model = TrendModel::fit_xy(entity, &xs, &observed)?;
    let fitted = xs.iter().map(|&x| model.predict(x)).collect();

    Ok(IndexTrend {
        entity: entity.to_string(),
        slope: model.slope(),
        intercept: model.intercept(),
        r_squared: model.r_squared(),
        indices,
        observed,
        fitted,
    })
}

/// [`index_trend`] for one entity or all of them.
pub fn index_trend_all(
    table: &Table,
    selection: Option<&str>,
) -> BTreeMap<String, Result<IndexTrend>> {
    let entities: Vec<&str> = match selection {
        Some(entity) => vec![entity],
        None => table.keys().collect(),
    };
    entities
        .into_par_iter()
        .map(|entity| (entity.to_string(), index_trend(table, entity)))
        .collect()
}
