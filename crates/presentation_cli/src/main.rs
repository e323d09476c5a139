//! masstransit CLI
//!
//! Command-line front end for the stop arrival client.

#![allow(clippy::print_stdout)]

mod console;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use integration_masstransit::{
    MasstransitClient, MasstransitConfig, NoopSink, StopInfoClient, TraceSink, TracingSink,
};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// masstransit CLI
#[derive(Parser)]
#[command(name = "masstransit-cli")]
#[command(author, version, about = "Bus and tram arrivals from Yandex Maps", long_about = None)]
struct Cli {
    /// Verbosity level (-vvv also dumps raw requests and responses)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: ./masstransit.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// getStopInfo endpoint URL
    #[arg(long)]
    host: Option<String>,

    /// Pre-supplied csrf token (skips the bootstrap refresh)
    #[arg(long)]
    token: Option<String>,

    /// Request locale, e.g. ru_RU
    #[arg(long)]
    locale: Option<String>,

    /// Request language, e.g. ru
    #[arg(long)]
    lang: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a fresh csrf token and print it
    Token,

    /// Show arrivals for one stop
    Stop {
        /// Stop identifier, e.g. stop__9640740
        id: String,

        /// Ask for live predictions
        #[arg(short, long)]
        prognosis: bool,

        /// Print the decoded response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive console
    Console {
        /// Start with prognosis mode on
        #[arg(short, long)]
        prognosis: bool,

        /// Start with JSON dumps on
        #[arg(long)]
        json: bool,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Load configuration from file and `MASSTRANSIT_*` environment variables
fn load_config(path: Option<&Path>) -> Result<MasstransitConfig, config::ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path),
        None => config::File::with_name("masstransit").required(false),
    };

    config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix("MASSTRANSIT").try_parsing(true))
        .build()?
        .try_deserialize()
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply_overrides(&self, mut config: MasstransitConfig) -> MasstransitConfig {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(token) = &self.token {
            config.csrf_token = Some(token.clone());
        }
        if let Some(locale) = &self.locale {
            config.locale.clone_from(locale);
        }
        if let Some(lang) = &self.lang {
            config.language.clone_from(lang);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = log_filter_from_verbosity(cli.verbose);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.apply_overrides(load_config(cli.config.as_deref())?);
    config.validate().map_err(anyhow::Error::msg)?;

    let sink: Arc<dyn TraceSink> = if cli.verbose >= 3 {
        Arc::new(TracingSink::new())
    } else {
        Arc::new(NoopSink)
    };

    let client = MasstransitClient::connect_with_sink(&config, sink).await?;
    tracing::info!(host = %config.host, locale = %config.locale, "Client ready");

    match cli.command {
        Commands::Token => {
            console::refresh_unless_bootstrapped(&client, &config).await?;
            println!("{}", client.token());
            if let Some(cookies) = client.cookies() {
                println!("cookies: {cookies}");
            }
        },

        Commands::Stop {
            id,
            prognosis,
            json,
        } => {
            let info =
                console::fetch_with_deadline(&client, &id, prognosis, console::FETCH_DEADLINE)
                    .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                for line in render::render_stop_info(&info, Utc::now()) {
                    println!("{line}");
                }
            }
        },

        Commands::Console { prognosis, json } => {
            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            console::run(&client, stdin, &mut stdout, prognosis, json).await?;
        },
    }

    Ok(())
}
