//! `testprof` command line: filter raw call-graph dumps, replay them through
//! the per-test pipeline and inspect the resulting artifacts.

mod cli_logger;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cli_logger::CliLogger;
use testprof::{Config, ProcessMetadata, ProfilingListener, RawProfileSample, ReplaySampler, TestIdentity};

#[derive(Debug, Parser)]
#[command(name = "testprof", version, about = "Per-test call-graph profiles without framework noise")]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = "testprof.toml")]
    config: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Remove test-infrastructure edges from a raw sample dump.
    Filter {
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the artifact file name for a test.
    Name {
        #[command(flatten)]
        test: TestArgs,
    },
    /// Run recorded samples through the profiling pipeline, one test
    /// execution per dump.
    Record {
        #[arg(required = true)]
        samples: Vec<PathBuf>,
        #[command(flatten)]
        test: TestArgs,
        #[arg(long)]
        target_dir: Option<PathBuf>,
    },
    /// List artifacts in the target directory.
    List {
        #[arg(long)]
        target_dir: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
struct TestArgs {
    #[arg(long = "class")]
    class_name: String,
    #[arg(long = "method")]
    method_name: String,
    #[arg(long = "data", default_value = "")]
    data_description: String,
}

impl TestArgs {
    fn identity(&self) -> TestIdentity {
        TestIdentity::new(&self.class_name, &self.method_name)
            .with_data_description(&self.data_description)
    }
}

#[derive(Debug, Serialize)]
pub struct FilterSummary {
    pub input: PathBuf,
    pub edges_in: usize,
    pub edges_out: usize,
    pub removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let logger = CliLogger::new(cli.json, cli.no_color);
    match run(&cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            logger.print_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, logger: &CliLogger) -> Result<()> {
    let mut config = Config::load_optional(&cli.config);
    match &cli.command {
        Command::Filter { input, out } => {
            let summary = filter_command(&config, input, out.as_deref())?;
            logger.print_filter_summary(&summary)
        }

        Command::Name { test } => logger.print_serialized(&serde_json::json!({
            "name": test.identity().artifact_name(),
        })),

        Command::Record {
            samples,
            test,
            target_dir,
        } => {
            if let Some(dir) = target_dir {
                config.target_dir = dir.clone();
            }
            let sampler = ReplaySampler::from_json_files(samples)?;
            let mut listener = ProfilingListener::new(&config, sampler, ProcessMetadata::new())?;
            let identity = test.identity();
            let mut written = Vec::new();
            for _ in samples {
                listener.start_test(&identity);
                written.extend(listener.end_test(&identity));
            }
            logger.print_paths("wrote", &written)
        }

        Command::List { target_dir } => {
            let dir = target_dir.as_ref().unwrap_or(&config.target_dir);
            let artifacts = testprof::list_artifacts(dir)
                .with_context(|| format!("listing {}", dir.display()))?;
            logger.print_paths("artifact", &artifacts)
        }
    }
}

fn filter_command(config: &Config, input: &Path, out: Option<&Path>) -> Result<FilterSummary> {
    let raw = RawProfileSample::read_json(input)
        .with_context(|| format!("reading sample {}", input.display()))?;
    let filtered = config.profile_filter()?.filter(&raw)?;
    if let Some(path) = out {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec(&filtered)?)?;
    }
    Ok(FilterSummary {
        input: input.to_path_buf(),
        edges_in: raw.len(),
        edges_out: filtered.len(),
        removed: raw.len() - filtered.len(),
        output: out.map(Path::to_path_buf),
    })
}
