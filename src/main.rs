use anyhow::{Context, Result};
use clap::Parser;
use logtally::{CalendarRange, LineLayout, VisitTally};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logtally", version)]
#[command(about = "Count visits per path and per day in a fixed-layout access log")]
struct Cli {
    /// Access log to read
    input: PathBuf,

    /// JSON report to write
    output: PathBuf,

    /// Number of concurrent tally workers (defaults to available parallelism)
    #[arg(long, short)]
    workers: Option<usize>,

    /// Hand partial counts back through packed files in this directory
    #[arg(long)]
    spill_dir: Option<PathBuf>,

    /// JSON file with the line layout (`prefix_len`, `datetime_len`)
    #[arg(long)]
    layout: Option<PathBuf>,

    #[arg(long)]
    first_year: Option<i32>,

    #[arg(long)]
    last_year: Option<i32>,

    /// Indent the JSON report
    #[arg(long)]
    pretty: bool,

    /// Show progress bars
    #[arg(long)]
    progress: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let layout = match &cli.layout {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("read layout {}", path.display()))?;
            serde_json::from_str::<LineLayout>(&raw).with_context(|| format!("parse layout {}", path.display()))?
        }
        None => LineLayout::default(),
    };
    let defaults = CalendarRange::default();
    let calendar = CalendarRange::new(
        cli.first_year.unwrap_or(defaults.first_year),
        cli.last_year.unwrap_or(defaults.last_year),
    );

    let mut tally = VisitTally::new()
        .layout(layout)
        .calendar(calendar)
        .pretty(cli.pretty)
        .progress(cli.progress);
    if let Some(n) = cli.workers {
        tally = tally.workers(n);
    }
    if let Some(dir) = &cli.spill_dir {
        tally = tally.spill_dir(dir);
    }

    let summary = tally.run(&cli.input, &cli.output)?;
    println!(
        "{} paths, {} visits across {} workers in {} ms",
        summary.paths, summary.visits, summary.workers, summary.elapsed_ms
    );
    Ok(())
}
