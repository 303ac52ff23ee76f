use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use kpi_volume_generator::{
    default_date_range, generate_volumes, inspect_catalog_dir, write_documents, GenerationRequest,
    WeekIndexing,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum WeekIndexingArg {
    #[value(name = "legacy52")]
    Legacy52,
    #[value(name = "iso-calendar")]
    IsoCalendar,
}

impl From<WeekIndexingArg> for WeekIndexing {
    fn from(arg: WeekIndexingArg) -> Self {
        match arg {
            WeekIndexingArg::Legacy52 => WeekIndexing::Legacy52,
            WeekIndexingArg::IsoCalendar => WeekIndexing::IsoCalendar,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "kpi-volume-generator", version, about = "Generate synthetic KPI volume files")]
struct Cli {
    /// Folder containing accounts.json, products.json and KPIs.json
    #[arg(short = 'c', long = "catalog-dir")]
    catalog_dir: PathBuf,

    /// Folder the output documents are written to
    #[arg(short = 'o', long = "output-dir")]
    output_dir: PathBuf,

    /// First date (YYYY-MM-DD); defaults to January 1st of the current year
    #[arg(long = "start-date")]
    start_date: Option<NaiveDate>,

    /// Last date (YYYY-MM-DD); defaults to December 31st of the current year
    #[arg(long = "end-date")]
    end_date: Option<NaiveDate>,

    #[arg(long = "sales-org", default_value = "0000")]
    sales_org: String,

    /// How weekly period offsets are counted across ISO years
    #[arg(long = "week-indexing", value_enum, default_value = "legacy52")]
    week_indexing: WeekIndexingArg,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let status = inspect_catalog_dir(&cli.catalog_dir);
    for (file, file_status) in &status.files {
        println!("{:<15} {}", file, file_status);
    }
    let Some(catalogs) = status.catalogs else {
        bail!(
            "catalog folder {} is incomplete",
            cli.catalog_dir.display()
        );
    };

    let now = Local::now().naive_local();
    let (default_start, default_end) = default_date_range(now.date());
    let request = GenerationRequest::new(
        catalogs,
        cli.start_date.unwrap_or(default_start),
        cli.end_date.unwrap_or(default_end),
        cli.sales_org,
    )
    .with_week_indexing(cli.week_indexing.into());

    let report = generate_volumes(&request);
    let written = write_documents(&cli.output_dir, &report, now)
        .with_context(|| format!("writing documents to {}", cli.output_dir.display()))?;

    for path in &written {
        println!("{}", path.display());
    }
    println!(
        "{} file(s) written, {} row(s), {} cell(s) defaulted to 0",
        written.len(),
        report.total_rows(),
        report.errors.len()
    );

    Ok(())
}
