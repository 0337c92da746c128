use anyhow::{Context, Result};
use clap::Parser;
use statetrends::{
    load::load_table,
    normalize::{normalize_table, NormalizeOptions},
};
use tracing_subscriber::{fmt, EnvFilter};

/// Load and normalize one file, then print what survived.
#[derive(Parser)]
#[command(author, version, about = "Inspect a single input table")]
struct Args {
    path: String,
    /// First cell of the header row.
    #[arg(long, default_value = "State")]
    header: String,
    /// Use the home-value column rules (drop region metadata, rename RegionName).
    #[arg(long)]
    home_values: bool,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let raw = load_table(&args.path, &args.header)
        .with_context(|| format!("loading {}", args.path))?;
    println!(
        "raw: {} rows x {} columns",
        raw.rows.len(),
        raw.headers.len()
    );

    let opts = if args.home_values {
        NormalizeOptions::home_values()
    } else {
        NormalizeOptions::default()
    };
    let table = normalize_table(&raw, &opts).with_context(|| format!("normalizing {}", args.path))?;
    let labels = table.period_labels();
    println!(
        "normalized: {} rows x {} periods",
        table.num_rows(),
        labels.len()
    );
    if let (Some(first), Some(last)) = (labels.first(), labels.last()) {
        println!("periods: {} .. {}", first, last);
    }
    for key in table.keys().take(5) {
        println!("  {}", key);
    }
    if table.num_rows() > 5 {
        println!("  ... {} more", table.num_rows() - 5);
    }
    Ok(())
}
