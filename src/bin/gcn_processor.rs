//! GCN fraud scoring CLI
//!
//! Reads a graph payload (file or stdin), trains a fresh model on it and
//! writes the JSON response envelope.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use gcn_fraud_detection::{analyze_json, AnalysisResponse, Config, Error};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "gcn_processor")]
#[command(about = "Score transaction graph addresses for fraud with a GCN", long_about = None)]
struct Cli {
    /// Graph payload (JSON); `-` reads stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Where to write the response; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for weight initialization and dropout
    #[arg(long)]
    seed: Option<u64>,

    /// Number of training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Adam learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(seed) = self.seed {
            config.training.seed = Some(seed);
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(lr) = self.lr {
            config.training.learning_rate = lr;
        }
        config.validate()?;
        Ok(config)
    }

    fn read_input(&self) -> Result<String> {
        if self.input == "-" {
            let mut body = String::new();
            io::stdin()
                .read_to_string(&mut body)
                .context("failed to read payload from stdin")?;
            Ok(body)
        } else {
            fs::read_to_string(&self.input)
                .with_context(|| format!("failed to read {}", self.input))
        }
    }

    fn write_response(&self, response: &AnalysisResponse) -> Result<()> {
        let mut json = if self.pretty {
            serde_json::to_string_pretty(response)?
        } else {
            serde_json::to_string(response)?
        };
        json.push('\n');

        match &self.output {
            Some(path) => fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => io::stdout().lock().write_all(json.as_bytes())?,
        }
        Ok(())
    }
}

/// Exit status when the pipeline failed while processing a valid request.
const EXIT_PIPELINE_FAILURE: u8 = 1;
/// Exit status when the request itself was rejected.
const EXIT_REJECTED_REQUEST: u8 = 2;

fn failure_status(err: &Error) -> u8 {
    if err.is_client_error() {
        EXIT_REJECTED_REQUEST
    } else {
        EXIT_PIPELINE_FAILURE
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let config = cli.load_config()?;
    let body = cli.read_input()?;

    let (response, status) = match analyze_json(&body, &config) {
        Ok(analysis) => {
            info!(
                "Analysis complete: {} of {} nodes predicted fraud",
                analysis.report.summary.fraud_predicted, analysis.report.summary.total_nodes
            );
            (AnalysisResponse::success(analysis.report), 0)
        }
        Err(err) => {
            error!("Analysis failed: {}", err);
            (AnalysisResponse::failure(&err), failure_status(&err))
        }
    };

    cli.write_response(&response)?;
    Ok(status)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {}", err);
    }

    match run(&cli) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            error!("{:#}", err);
            let response = AnalysisResponse::Failure {
                success: false,
                error: format!("{:#}", err),
            };
            if let Err(write_err) = cli.write_response(&response) {
                error!("failed to write error response: {:#}", write_err);
            }
            ExitCode::from(EXIT_PIPELINE_FAILURE)
        }
    }
}
