use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cityweather::config::{Config, ResponsePolicy};
use cityweather::gateway::{self, AppState};
use cityweather::policy;
use cityweather::resolver::CityQuery;
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Current temperatures for a list of cities, fetched concurrently.
#[derive(Parser, Debug)]
#[command(name = "cityweather", version, about)]
struct Cli {
    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway (default)
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// How partially failed lookups are reported
        #[arg(long, value_enum)]
        policy: Option<ResponsePolicy>,

        /// Maximum lookups in flight per request
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// Look up a comma-separated list of cities once and print the JSON body
    Lookup {
        /// e.g. "London,Tokyo"
        cities: String,

        /// How partially failed lookups are reported
        #[arg(long, value_enum)]
        policy: Option<ResponsePolicy>,

        /// Maximum lookups in flight
        #[arg(long)]
        max_concurrency: Option<usize>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        None => gateway::run_gateway(config).await,
        Some(Commands::Serve {
            host,
            port,
            policy,
            max_concurrency,
        }) => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(policy) = policy {
                config.weather.policy = policy;
            }
            if max_concurrency.is_some() {
                config.weather.max_concurrency = max_concurrency;
            }
            config.validate()?;
            gateway::run_gateway(config).await
        }
        Some(Commands::Lookup {
            cities,
            policy,
            max_concurrency,
        }) => {
            if let Some(policy) = policy {
                config.weather.policy = policy;
            }
            if max_concurrency.is_some() {
                config.weather.max_concurrency = max_concurrency;
            }
            config.validate()?;
            run_lookup(&config, &cities).await
        }
    }
}

async fn run_lookup(config: &Config, cities: &str) -> Result<()> {
    let state = AppState::from_config(config)?;
    let resolution = state.resolver.resolve(&CityQuery::parse(cities)).await;
    let outcome = policy::apply(state.policy, resolution);

    let body = policy::to_pretty_json(&outcome).context("Failed to encode response")?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;

    if outcome.is_rejected() {
        std::process::exit(1);
    }
    Ok(())
}
