use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tablegraph::config::{CliOverrides, RunConfig};
use tablegraph::pipeline::Pipeline;
use tablegraph::triples::DeterministicIds;

/// Tablegraph - convert tabular data into RDF statements
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run configuration file (YAML or JSON)
    #[arg(long, short)]
    config: PathBuf,

    /// Directory chunk files are written to
    #[arg(long)]
    output_dir: Option<String>,

    /// Source rows per output chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Identifier mode: NONE, FILE or GLOBAL
    #[arg(long)]
    deterministic_ids: Option<DeterministicIds>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json_report: bool,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        CliOverrides {
            output_dir: cli.output_dir.clone(),
            chunk_size: cli.chunk_size,
            deterministic_ids: cli.deterministic_ids,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Tablegraph v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RunConfig::from_file(&cli.config)
        .with_context(|| format!("Configuration error in {}", cli.config.display()))?;
    config.merge_cli(CliOverrides::from(&cli))?;

    let pipeline = Pipeline::new(&config)?;
    let report = pipeline.run()?;

    for skipped in &report.skipped_jobs {
        log::warn!("Skipped {}", skipped);
    }
    if cli.json_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
