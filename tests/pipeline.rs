use anyhow::Result;
use statetrends::{
    analysis::Correlation,
    config::PipelineConfig,
    pipeline::{self, Datasets},
    PipelineError,
};
use std::{fs, path::Path};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

const TRAINING: &str = r#"Table H-8. Median Household Income by State: 2016 to 2018
"(Dollars)"
State,2018,2018 (SE),2017,2017 (SE),2016,2016 (SE)
Ohio,"60,000",500,"58,000",410,"56,000",390
Utah,"70,000",620,"69,000",600,"68,000",580
Maine,"55,000",700,"54,000",690,"53,000",680
Guam,,,"1,000",,,
Footnotes are provided with the table.
"#;

const EVALUATION: &str = r#"Table H-8. Median Household Income by State: 2019 to 2023
State,2023,2023 (SE),2022,2022 (SE),2021,2020,2019
Ohio,"71,000",900,"68,000",880,"65,000","64,000","62,500"
Utah,"76,000",900,"75,000",880,"74,000","73,000","72,000"
Texas,"73,000",900,"72,000",880,"70,000","68,000","67,000",
"#;

const HOME_VALUES: &str = "RegionID,SizeRank,RegionName,RegionType,StateName,\
2019-01-31,2019-06-30,2020-01-31,2020-06-30,2021-01-31,2022-01-31,2023-01-31
1,0,Ohio,state,,125000,125000,128000,128000,130000,136000,142000
2,1,Utah,state,,300000,300000,300000,300000,300000,300000,300000
3,2,Texas,state,,250000,250000,240000,240000,230000,220000,200000
4,3,Colorado,state,,400000,410000,420000,430000,440000,450000,460000
";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

fn write(dir: &Path, name: &str, body: &str) -> Result<std::path::PathBuf> {
    let path = dir.join(name);
    fs::write(&path, body)?;
    Ok(path)
}

fn fixture() -> Result<(TempDir, PipelineConfig)> {
    let dir = tempfile::tempdir()?;
    let mut cfg = PipelineConfig::default();
    cfg.training.path = write(dir.path(), "income_2018.csv", TRAINING)?;
    cfg.evaluation.path = write(dir.path(), "income_2023.csv", EVALUATION)?;
    cfg.home_values.path = write(dir.path(), "zillow.csv", HOME_VALUES)?;
    Ok((dir, cfg))
}

#[test]
fn test_datasets_are_normalized() -> Result<()> {
    let (_dir, cfg) = fixture()?;
    let Datasets {
        training,
        evaluation,
        home_values,
        home_values_yearly,
    } = pipeline::load_datasets(&cfg)?;

    // Guam and the footnote row are incomplete
    assert_eq!(training.keys().collect::<Vec<_>>(), vec!["Ohio", "Utah", "Maine"]);
    assert_eq!(training.period_labels(), vec!["2018", "2017", "2016"]);
    assert_eq!(evaluation.num_periods(), 5);
    assert_eq!(home_values.key_label(), "State");
    assert_eq!(home_values.num_periods(), 7);
    assert_eq!(
        home_values_yearly.period_labels(),
        vec!["2019", "2020", "2021", "2022", "2023"]
    );
    assert_eq!(home_values_yearly.num_rows(), home_values.num_rows());
    Ok(())
}

#[test]
fn test_full_run() -> Result<()> {
    init_tracing();
    let (_dir, cfg) = fixture()?;
    let report = pipeline::run(&cfg)?;

    let ohio = &report.forecasts["Ohio"];
    assert!((ohio.trend.slope - 2000.0).abs() < 1e-6);
    assert_eq!(ohio.trend.forecast.first().map(|p| p.0), Some(2016));
    assert_eq!(ohio.trend.forecast.last().map(|p| p.0), Some(2023));
    let expected = [(2019, 500.0), (2020, 0.0), (2021, -1000.0), (2022, 0.0), (2023, 1000.0)];
    assert_eq!(ohio.residuals.len(), expected.len());
    for ((p, r), (ep, er)) in ohio.residuals.iter().zip(expected) {
        assert_eq!(*p, ep);
        assert!((r - er).abs() < 1e-6, "{}: {} != {}", p, r, er);
    }

    // in training only
    assert!(!report.forecasts.contains_key("Maine"));
    assert!(report
        .skipped
        .iter()
        .any(|s| s.entity == "Maine" && s.analysis == "forecast"));
    // in evaluation only
    assert!(!report.forecasts.contains_key("Texas"));

    assert_eq!(report.index_trends.len(), 4);
    assert!(report.index_trends["Colorado"].slope > 0.0);

    let corr = &report.correlations;
    assert_eq!(corr.periods, vec!["2019", "2020", "2021", "2022", "2023"]);
    let r = corr.get("Ohio").and_then(|c| c.coefficient()).unwrap();
    assert!((r - 1.0).abs() < 1e-9);
    assert!(corr.get("Texas").and_then(|c| c.coefficient()).unwrap() < 0.0);
    assert_eq!(corr.get("Utah"), Some(Correlation::InsufficientData));
    assert_eq!(corr.get("Colorado"), None);
    assert_eq!(corr.get("Maine"), None);

    let ranked: Vec<&str> = corr.ranked().into_iter().map(|(k, _)| k).collect();
    assert_eq!(ranked, vec!["Ohio", "Texas", "Utah"]);

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["correlations"]["entries"]["Utah"], "insufficient");
    Ok(())
}

#[test]
fn test_single_entity_selection() -> Result<()> {
    let (_dir, mut cfg) = fixture()?;
    cfg.entity = Some("Utah".into());
    let report = pipeline::run(&cfg)?;
    assert_eq!(report.forecasts.keys().collect::<Vec<_>>(), vec!["Utah"]);
    assert_eq!(report.index_trends.len(), 1);
    assert_eq!(report.correlations.len(), 3);
    assert!(report.render_text().contains("Utah: Insufficient data"));
    Ok(())
}

#[test]
fn test_missing_header_is_malformed() -> Result<()> {
    let (dir, mut cfg) = fixture()?;
    cfg.evaluation.path = write(dir.path(), "bad.csv", "Name,2019\nOhio,1\n")?;
    let err = pipeline::run(&cfg).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput { .. }), "{err}");
    Ok(())
}

#[test]
fn test_non_numeric_cell_is_fatal() -> Result<()> {
    let (dir, mut cfg) = fixture()?;
    cfg.training.path = write(dir.path(), "typo.csv", "State,2018,2017\nOhio,60000,n/a\n")?;
    let err = pipeline::run(&cfg).unwrap_err();
    match err {
        PipelineError::DataType { row_key, column, .. } => {
            assert_eq!(row_key, "Ohio");
            assert_eq!(column, "2017");
        }
        other => panic!("unexpected {other}"),
    }
    Ok(())
}
