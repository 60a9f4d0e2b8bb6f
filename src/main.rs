use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use scrapeflow::app::{handle_fatal_error, init_logging, AppConfig};
use scrapeflow::flow::FlowDefinition;
use scrapeflow::job::{run_batch, run_job, JobBatch, JobOptions, ScrapeJob};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Service name used when a single run does not name one
const AD_HOC_SERVICE_NAME: &str = "adHoc execution";

/// Run declarative scraping flows against local documents
#[derive(Parser)]
#[command(name = "scrapeflow")]
#[command(about = "Interpret scraping flows into tables and hierarchies", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for thread ids)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file (defaults to ./scrapeflow.toml when present)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Directory saved files are written under
    #[arg(short = 'o', long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one flow against one document
    Run {
        /// Flow definition file (YAML)
        #[arg(short, long)]
        flow: PathBuf,

        /// Document to scrape (XML/XHTML)
        #[arg(short, long)]
        document: PathBuf,

        /// Value of the ServiceName variable
        #[arg(short = 's', long)]
        service_name: Option<String>,

        /// Print the flow's final value as JSON
        #[arg(long)]
        print: bool,

        /// Run the flow without writing any files
        #[arg(long)]
        dry_run: bool,
    },
    /// Run every job in a batch file in parallel
    Batch {
        /// Batch file: a YAML list of jobs
        jobs: PathBuf,

        /// Maximum number of jobs running at once
        #[arg(short = 'j', long)]
        max_parallel: Option<usize>,

        /// Run the flows without writing any files
        #[arg(long)]
        dry_run: bool,
    },
    /// Load and validate a flow, then print its action tree
    Validate {
        /// Flow definition file (YAML)
        #[arg(short, long)]
        flow: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.verbose, cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => handle_fatal_error(e, cli.verbose),
    };
    let config = match cli.output_dir {
        Some(dir) => config.with_output_dir(dir),
        None => config,
    };

    init_logging(&config);

    let result = match cli.command {
        Commands::Run {
            flow,
            document,
            service_name,
            print,
            dry_run,
        } => run_single(&config, flow, document, service_name, print, dry_run),
        Commands::Batch {
            jobs,
            max_parallel,
            dry_run,
        } => {
            let config = match max_parallel {
                Some(n) => config.clone().with_max_parallel(n),
                None => config.clone(),
            };
            run_jobs(&config, &jobs, dry_run).await
        }
        Commands::Validate { flow } => validate(&flow),
    };

    if let Err(e) = result {
        handle_fatal_error(e, config.verbose);
    }
}

fn run_single(
    config: &AppConfig,
    flow: PathBuf,
    document: PathBuf,
    service_name: Option<String>,
    print: bool,
    dry_run: bool,
) -> Result<()> {
    let job = ScrapeJob::new(document, flow)
        .with_service_name(service_name.unwrap_or_else(|| AD_HOC_SERVICE_NAME.to_string()));
    let options = JobOptions {
        output_dir: config.output_dir.clone(),
        dry_run,
    };

    let report = run_job(&job, &options)?;
    for path in &report.written {
        if dry_run {
            println!("would write {}", path.display());
        } else {
            println!("wrote {}", path.display());
        }
    }
    if print {
        let json = serde_json::to_string_pretty(&report.value)
            .context("Failed to render flow result")?;
        println!("{json}");
    }
    Ok(())
}

async fn run_jobs(config: &AppConfig, jobs: &Path, dry_run: bool) -> Result<()> {
    let batch = JobBatch::load(jobs)?;
    let total = batch.jobs.len();
    let options = JobOptions {
        output_dir: config.output_dir.clone(),
        dry_run,
    };

    let outcomes = run_batch(batch.jobs, &options, config.max_parallel).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => println!(
                "ok     {} ({} files)",
                outcome.document.display(),
                report.written.len()
            ),
            Err(message) => {
                failed += 1;
                println!("failed {}: {}", outcome.document.display(), message);
            }
        }
    }
    info!("{} of {} jobs succeeded", total - failed, total);

    if failed > 0 {
        return Err(anyhow!("{failed} of {total} jobs failed"));
    }
    Ok(())
}

fn validate(flow: &Path) -> Result<()> {
    let definition = FlowDefinition::load(flow)?;
    debug!("Flow {} is valid", flow.display());
    print!("{}", definition.describe());
    println!(
        "{} steps, {} actions",
        definition.steps.len(),
        definition.action_count()
    );
    Ok(())
}
