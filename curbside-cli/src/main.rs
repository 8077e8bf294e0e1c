//! Command line front end for curbside: look up collection schedules, statewide
//! recycling rules, and email schedules to residents.

mod app;
mod config;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use curbside_core::{plugin::PluginRegistry, service::ScheduleOutcome};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Exit code for a rules lookup that matched nothing.
const NO_RULES_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "curbside", version, about)]
struct Args {
    /// Configuration file
    #[arg(long, global = true, env = "CURBSIDE_CONFIG", default_value = "curbside.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up the collection schedule for an address
    Schedule {
        /// Street address, e.g. "200 E Santa Clara St"
        #[arg(long)]
        address: String,
        /// Five digit ZIP code
        #[arg(long)]
        zip: Option<String>,
        /// Skip the on-disk cache for this lookup
        #[arg(long)]
        no_cache: bool,
    },
    /// Show statewide recycling rules for a ZIP code
    Rules {
        /// Five digit ZIP code
        zip: String,
    },
    /// Email the collection schedule for an address
    Notify {
        /// Recipient address
        #[arg(long)]
        email: String,
        /// Street address
        #[arg(long)]
        address: String,
        /// Five digit ZIP code
        #[arg(long)]
        zip: Option<String>,
    },
    /// List cities with a schedule provider
    Cities {
        /// Only show the city with this id, e.g. `san-jose`
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let base = args.config.parent().unwrap_or_else(|| Path::new(""));
    let config = Config::load(&args.config)?.rooted_at(base);
    debug!(
        postal_table = %config.data.postal_table.display(),
        cache = %config.cache.database_path.display(),
        webdriver = %config.scraper.webdriver_url,
        "effective configuration"
    );

    match args.command {
        Command::Schedule {
            address,
            zip,
            no_cache,
        } => {
            let service = app::build_service(&config, !no_cache).await?;
            let outcome = service.schedule_for(&address, zip.as_deref()).await?;
            print_json(&outcome)?;
        }
        Command::Rules { zip } => {
            let service = app::build_service(&config, false).await?;
            let report = service.rules_for(&zip)?;
            print_json(&report)?;
            if report.rules.is_none() {
                return Ok(ExitCode::from(NO_RULES_EXIT));
            }
        }
        Command::Notify {
            email,
            address,
            zip,
        } => {
            let notifier = app::build_notifier(&config)?;
            let service = app::build_service(&config, true).await?;
            let response = match service.schedule_for(&address, zip.as_deref()).await? {
                ScheduleOutcome::Found(response) => response,
                ScheduleOutcome::NotFound(reply) => bail!("{}", reply.message),
            };
            let receipt = notifier.send_schedule(&email, &response).await?;
            info!(to = %email, "schedule emailed");
            print_json(&receipt)?;
        }
        Command::Cities { id } => {
            let registry = PluginRegistry::new(app::plugins(&config));
            let cities = app::select_cities(&registry, id.as_deref())?;
            let mut stdout = io::stdout().lock();
            for city in cities {
                writeln!(stdout, "{}\t{}, {}", city.id, city.name, city.state)?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
