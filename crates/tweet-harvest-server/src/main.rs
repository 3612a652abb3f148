//! TweetHarvest server entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tokio_util::sync::CancellationToken;

use tweet_harvest::{Query, QueryKind, DEFAULT_LIMIT};
use tweet_harvest_server::config::{resolve_addr, HarvestArgs, ServiceConfig};
use tweet_harvest_server::http::{self, AppState};

#[derive(Parser)]
#[command(
    name = "tweet-harvest-server",
    about = "Scrape public timeline posts with a headless browser and serve them as JSON",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScrapeKind {
    Hashtag,
    User,
}

impl From<ScrapeKind> for QueryKind {
    fn from(kind: ScrapeKind) -> Self {
        match kind {
            ScrapeKind::Hashtag => QueryKind::Hashtag,
            ScrapeKind::User => QueryKind::User,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default).
    Serve {
        /// Listen address (host:port).
        /// Also reads from TWEET_HARVEST_ADDR env var.
        #[arg(long)]
        addr: Option<String>,

        #[command(flatten)]
        harvest: HarvestArgs,
    },

    /// Run a single query and print the records as JSON.
    Scrape {
        /// What the term names.
        #[arg(value_enum)]
        kind: ScrapeKind,

        /// Hashtag (without '#') or user handle (without '@').
        term: String,

        /// Maximum number of records.
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        #[command(flatten)]
        harvest: HarvestArgs,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   tweet-harvest-server completions bash > ~/.local/share/bash-completion/completions/tweet-harvest-server
    ///   tweet-harvest-server completions zsh > ~/.zfunc/_tweet-harvest-server
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

    match cli.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    match cli.command.unwrap_or(Commands::Serve {
        addr: None,
        harvest: HarvestArgs::default(),
    }) {
        Commands::Serve { addr, harvest } => {
            let config = ServiceConfig::from(harvest);
            let addr = resolve_addr(addr.as_deref());
            let state = AppState {
                harvester: config.harvester()?,
                default_limit: config.default_limit,
            };
            tracing::info!("TweetHarvest server");
            tracing::info!("Search endpoint: {}", config.harvest.base_url);
            http::serve(&addr, Arc::new(state)).await?;
        }

        Commands::Scrape {
            kind,
            term,
            limit,
            harvest,
        } => {
            let config = ServiceConfig::from(harvest);
            let harvester = config.harvester()?;
            let query = Query::new(kind.into(), term, limit)?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, releasing browser");
                    on_interrupt.cancel();
                }
            });

            let harvest = harvester.run(&query, &cancel).await?;
            tracing::info!(
                records = harvest.records.len(),
                skipped = harvest.skipped,
                termination = harvest.termination.as_str(),
                "scrape finished"
            );
            println!("{}", serde_json::to_string_pretty(&harvest.records)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                shell,
                &mut cmd,
                "tweet-harvest-server",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
