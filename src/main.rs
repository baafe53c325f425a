//! qagen CLI - batch Q/A extraction from documentation text.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use qagen::pipeline::ProgressSink;
use qagen::{ChatClient, Config, Pipeline, RateLimitedCaller};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "qagen")]
#[command(version)]
#[command(about = "Extract Q/A fine-tuning pairs from README-style documentation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults are used if absent)
    #[arg(short, long, global = true, default_value = "qagen.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract Q/A pairs from document content and print them as JSON
    Generate {
        /// The document content to process
        #[arg(long)]
        content: String,

        /// Override the configured checkpoint store path
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Override the configured failure log path
        #[arg(long)]
        failed_log: Option<PathBuf>,
    },

    /// Validate configuration and API key resolution
    ValidateConfig,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# qagen configuration file

[backend]
# API key (can also use OPENAI_API_KEY env var)
# api_key = "sk-..."
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
timeout_secs = 180
max_tokens = 2048
temperature = 0.7

[limits]
max_concurrent = 5
retry_attempts = 5
initial_backoff_secs = 4
max_backoff_secs = 60

[extract]
context_window = 2
max_context_lines = 20

[output]
checkpoint_path = "output_data/qa_pairs.jsonl"
failed_log_path = "failed_questions.jsonl"
"#;
    println!("{example}");
}

/// Progress bar sink for the batch CLI (stderr, stdout stays clean JSON).
struct BarSink(ProgressBar);

impl BarSink {
    fn new() -> Self {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent}% {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        Self(pb)
    }
}

impl ProgressSink for BarSink {
    fn report(&self, percent: f64) {
        self.0.set_position(percent.round() as u64);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            Ok(())
        }

        Commands::ValidateConfig => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            config
                .resolve_api_key()
                .context("Failed to resolve API key")?;

            info!("Configuration is valid");
            info!("  Model: {}", config.backend.model);
            info!("  Max concurrent calls: {}", config.limits.max_concurrent);
            info!("  Checkpoint: {:?}", config.output.checkpoint_path);
            Ok(())
        }

        Commands::Generate {
            content,
            checkpoint,
            failed_log,
        } => {
            let mut config = Config::load_or_default(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            if let Some(path) = checkpoint {
                config.output.checkpoint_path = path;
            }
            if let Some(path) = failed_log {
                config.output.failed_log_path = path;
            }

            let api_key = config
                .resolve_api_key()
                .context("Failed to resolve API key")?;

            let client = Arc::new(ChatClient::new(api_key, &config.backend)?);
            let caller = Arc::new(RateLimitedCaller::new(client, &config.limits));
            let pipeline = Pipeline::new(&config, caller);

            let bar = BarSink::new();
            let report = pipeline.run(&content, &bar).await?;
            bar.0.finish_and_clear();

            info!(
                pairs = report.stats.pairs_emitted,
                replayed = report.stats.replayed,
                skipped = report.stats.skipped,
                failed_rounds = report.stats.rounds_failed,
                runtime_secs = format!("{:.1}", report.stats.runtime_secs),
                "Run complete"
            );

            // Whatever was produced is printed, even when rounds failed;
            // failures live in the failure log, not the exit code.
            println!("{}", serde_json::to_string(&report.pairs)?);
            Ok(())
        }
    }
}
