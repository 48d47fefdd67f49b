//! pageaudit command-line entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use pageaudit::{AuditError, Category, PageFetcher};
use pageaudit_cli::{render, AuditConfig, OutputFormat};

#[derive(Parser)]
#[command(
    name = "pageaudit",
    about = "Fetch a web page and score it for SEO, performance, content, accessibility, security and design",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a page and print its report.
    Analyze {
        /// Page URL (http or https).
        url: String,

        /// Category to analyze; repeat for several. Defaults to all.
        #[arg(short, long = "category")]
        categories: Vec<String>,

        /// Ask the configured language model for extra recommendations.
        #[arg(long)]
        ai: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Per-unit timeout in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Path to a JSON config file.
        /// Also reads from PAGEAUDIT_CONFIG env var.
        #[arg(long)]
        config: Option<String>,
    },

    /// List categories and their weight in the overall score.
    Categories,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   pageaudit completions bash > ~/.local/share/bash-completion/completions/pageaudit
    ///   pageaudit completions zsh > ~/.zfunc/_pageaudit
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            url,
            categories,
            ai,
            format,
            timeout_secs,
            config,
        } => {
            let mut config = AuditConfig::resolve(config.as_deref())?;
            if !categories.is_empty() {
                config.categories = categories;
            }
            if ai {
                config.ai.enabled = true;
            }
            if let Some(secs) = timeout_secs {
                config.unit_timeout_secs = secs;
            }
            let categories = config.categories()?;
            if config.ai.enabled && config.ai.api_key.is_none() {
                tracing::warn!("AI recommendations requested but no API key is configured");
            }

            let fetcher = PageFetcher::new(config.fetch_timeout());
            let page = match fetcher.fetch_until(&url, ctrl_c()).await {
                Ok(page) => page,
                Err(AuditError::Cancelled) => exit_cancelled(),
                Err(e) => return Err(e.into()),
            };

            match config
                .orchestrator()
                .analyze_until(Arc::new(page), &categories, ctrl_c())
                .await
            {
                Ok(report) => println!("{}", render(&report, format)?),
                Err(AuditError::Cancelled) => exit_cancelled(),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Categories => {
            for category in Category::ALL {
                println!(
                    "{:<14} {:<14} {:.2}",
                    category.as_str(),
                    category.label(),
                    category.weight()
                );
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "pageaudit", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn ctrl_c() {
    let _ = tokio::signal::ctrl_c().await;
}

fn exit_cancelled() -> ! {
    eprintln!("Analysis cancelled");
    std::process::exit(130);
}
