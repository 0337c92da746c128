//! Load every dataset, run the analytics, and collect one report.

use crate::aggregate::aggregate_yearly;
use crate::analysis::{
    correlation::{correlate, CorrelationResult},
    trend::{forecast_all, index_trend_all, EntityForecast, IndexTrend},
};
use crate::config::{DatasetConfig, PipelineConfig};
use crate::error::Result;
use crate::load::load_table;
use crate::normalize::normalize_table;
use crate::table::Table;
use serde::Serialize;
use std::{collections::BTreeMap, fmt::Write as _};
use tracing::{info, warn};

/// The normalized inputs.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub training: Table,
    pub evaluation: Table,
    pub home_values: Table,
    pub home_values_yearly: Table,
}

/// An entity one analysis had to leave out, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub entity: String,
    pub analysis: &'static str,
    pub reason: String,
}

/// Everything the presentation layer consumes.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub forecasts: BTreeMap<String, EntityForecast>,
    pub index_trends: BTreeMap<String, IndexTrend>,
    pub correlations: CorrelationResult,
    pub skipped: Vec<Skipped>,
}

pub fn load_dataset(cfg: &PipelineConfig, dataset: &DatasetConfig) -> Result<Table> {
    let raw = load_table(&dataset.path, &dataset.header_label)?;
    normalize_table(&raw, &cfg.normalize_options(dataset))
}

pub fn load_datasets(cfg: &PipelineConfig) -> Result<Datasets> {
    info!("cleaning training income data");
    let training = load_dataset(cfg, &cfg.training)?;
    info!("cleaning evaluation income data");
    let evaluation = load_dataset(cfg, &cfg.evaluation)?;
    info!("processing home value data");
    let home_values = load_dataset(cfg, &cfg.home_values)?;
    info!("aggregating home values to yearly averages");
    let home_values_yearly = aggregate_yearly(&home_values, &cfg.aggregate)?;

    Ok(Datasets {
        training,
        evaluation,
        home_values,
        home_values_yearly,
    })
}

/// Keep the successes, record recoverable failures, and stop on anything else.
fn partition<T>(
    analysis: &'static str,
    outcomes: BTreeMap<String, Result<T>>,
    skipped: &mut Vec<Skipped>,
) -> Result<BTreeMap<String, T>> {
    let mut kept = BTreeMap::new();
    for (entity, outcome) in outcomes {
        match outcome {
            Ok(v) => {
                kept.insert(entity, v);
            }
            Err(e) if e.is_recoverable() => {
                warn!(entity = %entity, analysis, "skipping: {}", e);
                skipped.push(Skipped {
                    entity,
                    analysis,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(kept)
}

/// Run trends, index trends and correlations. `selection` limits the per-entity
/// trend analyses to one entity; the correlation ranking always covers every
/// shared entity.
pub fn analyse(data: &Datasets, selection: Option<&str>) -> Result<Report> {
    let mut skipped = Vec::new();

    info!("performing linear regression on income data");
    let forecasts = partition(
        "forecast",
        forecast_all(&data.training, &data.evaluation, selection),
        &mut skipped,
    )?;

    info!("performing linear regression on home value data");
    let index_trends = partition(
        "index_trend",
        index_trend_all(&data.home_values, selection),
        &mut skipped,
    )?;

    info!("computing correlations between income and home values");
    let correlations = correlate(&data.evaluation, &data.home_values_yearly);

    Ok(Report {
        forecasts,
        index_trends,
        correlations,
        skipped,
    })
}

pub fn run(cfg: &PipelineConfig) -> Result<Report> {
    let data = load_datasets(cfg)?;
    analyse(&data, cfg.selection())
}

impl Report {
    /// Plain-text summary for terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (entity, fc) in &self.forecasts {
            let _ = writeln!(
                out,
                "{}: slope {:.2}/yr, intercept {:.2}, r2 {:.3}",
                entity, fc.trend.slope, fc.trend.intercept, fc.trend.r_squared
            );
            for (period, residual) in &fc.residuals {
                let _ = writeln!(out, "  {} residual {:+.2}", period, residual);
            }
        }
        for (entity, t) in &self.index_trends {
            let _ = writeln!(
                out,
                "{}: {:.2} per period over {} periods",
                entity,
                t.slope,
                t.indices.len()
            );
        }
        let _ = writeln!(
            out,
            "Correlation between median household income and median home values by state:"
        );
        out.push_str(&self.correlations.render_ranking());
        for s in &self.skipped {
            let _ = writeln!(out, "skipped {} ({}): {}", s.entity, s.analysis, s.reason);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn table(name: &str, periods: &[&str], rows: &[(&str, Vec<f64>)]) -> Table {
        Table::try_new(
            name,
            "State",
            rows.iter().map(|(k, _)| k.to_string()).collect(),
            periods
                .iter()
                .enumerate()
                .map(|(i, p)| (p.to_string(), rows.iter().map(|(_, v)| Some(v[i])).collect()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_partition_skips_recoverable() {
        let mut skipped = Vec::new();
        let outcomes = BTreeMap::from([
            ("Ohio".to_string(), Ok(1)),
            (
                "Guam".to_string(),
                Err(PipelineError::EntityNotFound {
                    entity: "Guam".into(),
                    table: "t".into(),
                }),
            ),
        ]);
        let kept = partition("forecast", outcomes, &mut skipped).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].entity, "Guam");
    }

    #[test]
    fn test_partition_stops_on_fatal() {
        let mut skipped = Vec::new();
        let outcomes: BTreeMap<String, Result<i32>> = BTreeMap::from([(
            "Ohio".to_string(),
            Err(PipelineError::InvalidPeriod {
                label: "x".into(),
                reason: "y".into(),
            }),
        )]);
        assert!(partition("forecast", outcomes, &mut skipped).is_err());
    }

    #[test]
    fn test_analyse_single_entity() {
        let years = ["2018", "2019", "2020"];
        let data = Datasets {
            training: table("training", &["2016", "2017"], &[("Ohio", vec![1.0, 2.0])]),
            evaluation: table(
                "evaluation",
                &years,
                &[("Ohio", vec![3.0, 4.0, 5.0]), ("Utah", vec![1.0, 2.0, 3.0])],
            ),
            home_values: table(
                "home_values",
                &["2018-01-31", "2018-02-28"],
                &[("Ohio", vec![1.0, 2.0]), ("Utah", vec![3.0, 3.0])],
            ),
            home_values_yearly: table(
                "home_values",
                &years,
                &[("Ohio", vec![10.0, 20.0, 30.0]), ("Utah", vec![3.0, 2.0, 1.0])],
            ),
        };
        let report = analyse(&data, Some("Ohio")).unwrap();
        assert_eq!(report.forecasts.len(), 1);
        assert_eq!(report.forecasts["Ohio"].residuals.len(), 3);
        assert_eq!(report.index_trends.len(), 1);
        assert_eq!(report.correlations.len(), 2);
        assert!(report.skipped.is_empty());

        let all = analyse(&data, None).unwrap();
        assert_eq!(all.forecasts.len(), 1);
        assert!(all.skipped.is_empty());
        assert!(all.render_text().contains("Utah: -1.00"));
    }
}
