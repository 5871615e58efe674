use cereal_dashboard::config::{parse_bind, DashboardConfig};
use cereal_dashboard::server::{self, AppState};
use cereal_dashboard::storage::TableReader;
use cereal_dashboard::surface::{present, ReportDir, Terminal};
use cereal_dashboard::{
    CerealTable, CountryOrder, Dashboard, Layout, Normalizer, Scaling, Selection, TableCache,
};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cereal-dashboard")]
#[command(about = "Relative cereal production metrics per country")]
#[command(version)]
struct Args {
    /// Path to the cereal production CSV (or set CEREAL_DATA_PATH)
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug, Clone)]
struct SelectionArgs {
    /// Country or region to show (default: first in the file)
    #[arg(short, long)]
    country: Option<String>,

    /// Baseline year (default: first year present for the country)
    #[arg(short, long)]
    baseline_year: Option<i64>,

    /// ratio (1.0 at baseline) or percent (100 at baseline)
    #[arg(short, long)]
    scaling: Option<Scaling>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the countries in the data file
    Countries {
        /// Sort alphabetically instead of file order
        #[arg(long)]
        sorted: bool,
    },
    /// Print the normalized table for a country
    Show {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Write the normalized table (or the raw rows) as CSV
    Export {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Export the raw source rows of the country instead
        #[arg(long)]
        raw: bool,
    },
    /// Render charts, table and page into a directory
    Render {
        #[command(flatten)]
        selection: SelectionArgs,

        /// combined or split
        #[arg(short, long)]
        layout: Option<Layout>,

        /// Output directory
        #[arg(short, long, default_value = "report")]
        out: PathBuf,
    },
    /// Serve the interactive dashboard over HTTP
    Serve {
        /// Address to bind (or set CEREAL_BIND)
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = DashboardConfig::from_env().context("Invalid configuration")?;
    if let Some(data) = args.data {
        config.data_path = data;
    }

    match args.command {
        Commands::Countries { sorted } => list_countries(&config, sorted),
        Commands::Show { selection } => show(&config, selection),
        Commands::Export { selection, out, raw } => export(&config, selection, out, raw),
        Commands::Render { selection, layout, out } => render_report(&config, selection, layout, out),
        Commands::Serve { bind } => serve(config, bind).await,
    }
}

fn selection_from(config: &DashboardConfig, args: SelectionArgs, layout: Option<Layout>) -> Selection {
    Selection {
        country: args.country,
        baseline_year: args.baseline_year,
        layout: layout.unwrap_or(config.layout),
        scaling: args.scaling.unwrap_or(config.scaling),
    }
}

fn list_countries(config: &DashboardConfig, sorted: bool) -> Result<()> {
    let table = config.reader().read()?;
    let order = if sorted { CountryOrder::Sorted } else { CountryOrder::FirstSeen };
    for country in table.distinct_countries(order)? {
        println!("{}", country);
    }
    Ok(())
}

fn show(config: &DashboardConfig, args: SelectionArgs) -> Result<()> {
    let table = config.reader().read()?;
    let selection = selection_from(config, args, None);
    let view = Dashboard::new(&table, config.renderer())
        .with_clip_to_baseline(config.clip_to_baseline)
        .view(&selection)?;

    let mut terminal = Terminal::new(io::stdout().lock());
    present(&view, &mut terminal)?;
    if let Some(notice) = view.notice {
        anyhow::bail!(notice);
    }
    Ok(())
}

fn export(config: &DashboardConfig, args: SelectionArgs, out: Option<PathBuf>, raw: bool) -> Result<()> {
    let table = config.reader().read()?;
    let country = match args.country.clone() {
        Some(country) => country,
        None => Dashboard::new(&table, config.renderer()).default_country()?,
    };
    let normalizer = Normalizer::new(args.scaling.unwrap_or(config.scaling))
        .with_clip_to_baseline(config.clip_to_baseline);

    // nothing is written unless the whole export succeeds
    let bytes = export_csv(&table, &country, raw, normalizer, args.baseline_year)?;
    match &out {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Exported {} to {}", country, path.display());
        }
        None => io::stdout().lock().write_all(&bytes)?,
    }
    Ok(())
}

/// The country's normalized rows, or its raw source rows, as CSV.
fn export_csv(
    table: &CerealTable,
    country: &str,
    raw: bool,
    normalizer: Normalizer,
    baseline_year: Option<i64>,
) -> cereal_dashboard::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if raw {
        for record in table.country_records(country)? {
            writer.serialize(record)?;
        }
    } else {
        let series = match baseline_year {
            Some(year) => normalizer.normalize(table, country, year)?,
            None => normalizer.normalize_from_first_year(table, country)?,
        };
        for row in series.rows() {
            writer.serialize(row)?;
        }
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

fn render_report(
    config: &DashboardConfig,
    args: SelectionArgs,
    layout: Option<Layout>,
    out: PathBuf,
) -> Result<()> {
    let table = config.reader().read()?;
    let selection = selection_from(config, args, layout);
    let view = Dashboard::new(&table, config.renderer())
        .with_clip_to_baseline(config.clip_to_baseline)
        .view(&selection)?;

    let mut report = ReportDir::create(&out)?;
    present(&view, &mut report)?;

    println!("Report written to {}", out.display());
    for path in report.written() {
        println!("  {}", path.display());
    }
    if let Some(notice) = view.notice {
        anyhow::bail!(notice);
    }
    Ok(())
}

async fn serve(mut config: DashboardConfig, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.bind = parse_bind(&bind)?;
    }

    let cache = TableCache::new(Box::new(config.reader()));
    // fail at startup rather than on the first request
    let table = cache.get()?;
    info!(
        "Serving {} rows from {}",
        table.len(),
        config.data_path.display()
    );

    let defaults = Selection::new(config.layout, config.scaling);
    let state = Arc::new(
        AppState::new(cache, config.renderer(), defaults).with_clip_to_baseline(config.clip_to_baseline),
    );
    server::serve(state, config.bind).await?;
    Ok(())
}
