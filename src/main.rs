// ABOUTME: CLI entry point for running API comparison jobs
// ABOUTME: Loads the catalog, runs the selected jobs with progress bars and prints summaries

use anyhow::{Context, Result};
use api_diff_runner::{Catalog, Engine, JobResult, RunOptions};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "api-diff-runner")]
#[command(
    about = "Compare two deployments of a JSON API and report classified differences",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// TOML file with jobs, endpoints, headers and ID lists
    #[arg(short, long, default_value = "config/comparison.toml")]
    config: PathBuf,
    /// Only run jobs with these names (repeatable)
    #[arg(short, long = "job")]
    jobs: Vec<String>,
    /// One ID and one geo variant per endpoint
    #[arg(long)]
    quick: bool,
    /// Maximum comparisons in flight per job (overrides CONCURRENCY_LIMIT)
    #[arg(long)]
    concurrency: Option<usize>,
    /// Verify TLS certificates of both sides
    #[arg(long)]
    strict_tls: bool,
    /// Write all job results to this file as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let catalog = Catalog::load(&cli.config)
        .with_context(|| format!("Failed to load catalog from {}", cli.config.display()))?;

    let jobs: Vec<_> = catalog
        .jobs
        .iter()
        .filter(|job| cli.jobs.is_empty() || cli.jobs.contains(&job.name))
        .cloned()
        .collect();
    if jobs.is_empty() {
        anyhow::bail!("No jobs selected from {}", cli.config.display());
    }

    let mut options = RunOptions::from_env();
    if cli.quick {
        options.quick_mode = true;
    }
    if let Some(limit) = cli.concurrency {
        options.concurrency_limit = limit.max(1);
    }
    options.accept_invalid_certs = !cli.strict_tls;

    let bars = progress_bars(&jobs.iter().map(|j| j.name.clone()).collect::<Vec<_>>())?;
    let engine = Engine::new(options)
        .context("Failed to initialize comparison engine")?
        .on_progress({
            let bars = Arc::clone(&bars);
            Arc::new(move |job: &str, completed: usize, total: usize| {
                if let Some(bar) = bars.get(job) {
                    bar.set_length(total as u64);
                    bar.set_position(completed as u64);
                }
            })
        });

    let outcomes = engine
        .run_all_jobs(&jobs, &catalog.headers, &catalog.ids, &catalog.endpoints)
        .await;
    for bar in bars.values() {
        bar.finish();
    }

    let mut results = Vec::new();
    let mut failed_jobs = 0;
    for (job, outcome) in jobs.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                print_summary(&result);
                results.push(result);
            }
            Err(err) => {
                failed_jobs += 1;
                eprintln!("✗ {}: {}", job.name, err);
            }
        }
    }

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&results).context("Failed to serialize results")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        println!("Results written to {}", path.display());
    }

    if failed_jobs > 0 {
        anyhow::bail!("{} job(s) could not run", failed_jobs);
    }
    Ok(())
}

fn progress_bars(job_names: &[String]) -> Result<Arc<HashMap<String, ProgressBar>>> {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template(
        "[{bar:40.cyan/blue}] {percent}% | {pos}/{len} | ETA: {eta} | {msg}",
    )
    .context("Invalid progress bar template")?
    .progress_chars("#>-");

    let bars = job_names
        .iter()
        .map(|name| {
            let bar = multi.add(ProgressBar::new(0));
            bar.set_style(style.clone());
            bar.set_message(name.clone());
            (name.clone(), bar)
        })
        .collect();
    Ok(Arc::new(bars))
}

fn print_summary(result: &JobResult) {
    let summary = &result.summary;
    println!("✓ {} (platform {})", result.job_name, result.platform);
    println!(
        "  {} comparisons, {} successful, {} failed",
        summary.total_comparisons, summary.successful, summary.failures
    );
    println!(
        "  {} with differences, {} differences total",
        summary.endpoints_with_diffs, summary.total_diffs
    );
    if !result.unresolved.is_empty() {
        println!("  unresolved endpoints: {}", result.unresolved.join(", "));
    }
    if result.missing_records() > 0 {
        println!("  {} comparisons produced no record", result.missing_records());
    }
}
