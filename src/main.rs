//! `cep-race`: look up a Brazilian postal code on several providers at once
//! and print whichever answers first.
//!
//! ```text
//! $ cep-race 01153000
//! 01153000: Rua Vitorino Carmilo, Barra Funda, São Paulo - SP (via ViaCEP)
//! ```
//!
//! Exit status: 0 on success, 1 when the first answer was an error, 124 when
//! no provider answered in time, 2 for invalid arguments and 130 when
//! interrupted.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use cep_race::config::{RaceConfig, SourceKind};
use cep_race::report::{JsonReporter, Reporter, TextReporter};
use cep_race::scope::Scope;
use cep_race::{Policy, Query};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Race a postal-code lookup across multiple providers.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The postal code to look up.
    #[arg(default_value = RaceConfig::DEFAULT_QUERY)]
    query: String,

    /// How long to wait for any provider, in milliseconds.
    #[arg(long, env = "CEP_RACE_TIMEOUT_MS", default_value_t = 1000)]
    timeout_ms: u64,

    /// When a failed lookup ends the race.
    #[arg(long, env = "CEP_RACE_POLICY", value_enum, default_value_t = Policy::FailFast)]
    policy: Policy,

    /// Providers to race. Repeat to select several; defaults to all.
    #[arg(long = "source", value_enum)]
    sources: Vec<SourceKind>,

    /// Base URL of the BrasilAPI endpoint.
    #[arg(long, env = "CEP_RACE_BRASIL_API_URL")]
    brasil_api_url: Option<String>,

    /// Base URL of the ViaCEP endpoint.
    #[arg(long, env = "CEP_RACE_VIA_CEP_URL")]
    via_cep_url: Option<String>,

    /// Print the outcome as JSON.
    #[arg(long)]
    json: bool,

    /// Log more. Repeat for more detail; `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn into_config(self) -> RaceConfig {
        let defaults = RaceConfig::default();
        RaceConfig {
            query: Query::from(self.query),
            timeout: Duration::from_millis(self.timeout_ms),
            policy: self.policy,
            sources: if self.sources.is_empty() {
                defaults.sources
            } else {
                self.sources
            },
            brasil_api_url: self.brasil_api_url.unwrap_or(defaults.brasil_api_url),
            via_cep_url: self.via_cep_url.unwrap_or(defaults.via_cep_url),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    let json = args.json;
    let config = args.into_config();

    let client = match reqwest::Client::builder()
        .user_agent(concat!("cep-race/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            eprintln!("error: failed to build HTTP client: {err}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Scope::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted");
                shutdown.cancel();
            }
        }
    });

    let race = config.build(&client);
    tracing::info!(query = %config.query, race = ?race, "looking up");

    let outcome = match race.run(&config.query, &shutdown).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(err.exit_code());
        }
    };

    let stdout = io::stdout().lock();
    let reported = if json {
        JsonReporter::new(stdout).report(&outcome)
    } else {
        TextReporter::new(stdout).report(&outcome)
    };
    if let Err(err) = reported {
        tracing::error!(error = %err, "failed to write outcome");
        return ExitCode::FAILURE;
    }

    ExitCode::from(outcome.exit_code())
}
