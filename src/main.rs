use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use statetrends::{config::PipelineConfig, pipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Income trend forecasts and income/home-value correlations by state"
)]
struct Args {
    /// YAML pipeline config; defaults apply to anything it leaves out.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Income table to fit trends on.
    #[arg(long)]
    training: Option<PathBuf>,
    /// Income table to check forecasts against.
    #[arg(long)]
    evaluation: Option<PathBuf>,
    /// Monthly home-value table.
    #[arg(long)]
    home_values: Option<PathBuf>,
    /// One entity to analyse, or "all".
    #[arg(short, long)]
    entity: Option<String>,
    #[arg(long, value_enum, default_value = "json")]
    format: Format,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) resolve config ───────────────────────────────────────────
    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(p) = args.training {
        cfg.training.path = p;
    }
    if let Some(p) = args.evaluation {
        cfg.evaluation.path = p;
    }
    if let Some(p) = args.home_values {
        cfg.home_values.path = p;
    }
    if args.entity.is_some() {
        cfg.entity = args.entity;
    }

    // ─── 3) run ──────────────────────────────────────────────────────
    let report = pipeline::run(&cfg).context("pipeline failed")?;
    info!(
        forecasts = report.forecasts.len(),
        correlations = report.correlations.len(),
        skipped = report.skipped.len(),
        "analysis complete"
    );

    // ─── 4) hand off to the presentation layer ───────────────────────
    match args.format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&report).context("serializing report")?;
            println!("{}", json);
        }
        Format::Text => print!("{}", report.render_text()),
    }

    info!("all done");
    Ok(())
}
