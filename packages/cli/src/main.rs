#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `group_scout`: find community groups around configured cities.
//!
//! `run` searches, resolves, filters, and prints the result. `validate`
//! and `cache` never touch the network.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use group_scout_cli_utils::IndicatifReporter;
use group_scout_config::{OutputKind, Settings};
use group_scout_pipeline::{Pipeline, PipelineConfig};
use group_scout_remote::geonames::GeoNamesGeocoder;
use group_scout_remote::graphql::GraphQlGroupService;
use group_scout_remote::retry::RetryPolicy;
use group_scout_remote::{Credential, RateLimiter};
use group_scout_store::GroupStore;

#[derive(Parser)]
#[command(name = "group_scout", about = "Community group discovery tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search all configured locations, apply filters, and print the result
    Run {
        /// Configuration file (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Group store to use instead of `<config>.store.json`
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Check a configuration file without calling any API
    Validate {
        /// Configuration file (TOML)
        #[arg(long)]
        config: PathBuf,
    },
    /// List the groups cached for a configuration
    Cache {
        /// Configuration file (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Group store to use instead of `<config>.store.json`
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = group_scout_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, store } => {
            let settings = Settings::load(&config)?;
            let store_path = store_path(&settings, &config, store);
            run(&settings, &store_path, IndicatifReporter::new(multi)).await?;
        }
        Commands::Validate { config } => {
            let settings = Settings::load(&config)?;
            print_summary(&settings, &config);
        }
        Commands::Cache { config, store } => {
            let settings = Settings::load(&config)?;
            let store = GroupStore::open(store_path(&settings, &config, store))?;
            println!("{:<16} {:<8} NAME", "ID", "MEMBERS");
            println!("{}", "-".repeat(60));
            for group in store.groups() {
                println!("{:<16} {:<8} {}", group.id, group.members, group.name);
            }
            println!("{} group(s) in {}", store.len(), store.path().display());
        }
    }

    Ok(())
}

fn store_path(settings: &Settings, config: &Path, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| settings.datastore_path(config))
}

async fn run(
    settings: &Settings,
    store_path: &Path,
    progress: IndicatifReporter,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = GroupStore::open(store_path)?;

    let limiter = RateLimiter::from_secs_f64(settings.api_rate_limit);
    let credential = Credential::from_env(&settings.remote.token_env)?;
    let service =
        GraphQlGroupService::new(&settings.remote, credential, limiter, settings.max_retries)?;
    let geocoder = GeoNamesGeocoder::new(
        &settings.geocoder,
        RetryPolicy::new(settings.max_retries, limiter.delay()),
    )?;

    let pipeline = Pipeline::new(PipelineConfig::from_settings(settings));
    let output = pipeline
        .run(&service, &geocoder, &mut store, &progress)
        .await?;

    log::debug!(
        "\n{}",
        group_scout_output::render_table(&output.columns, &output.groups)
    );

    for kind in &settings.output.types {
        match kind {
            OutputKind::Table => {
                print!(
                    "{}",
                    group_scout_output::render_table(&output.columns, &output.groups)
                );
            }
            OutputKind::Csv => {
                // Presence is checked when the config is loaded.
                if let Some(path) = &settings.output.csv_path {
                    group_scout_output::write_csv(path, &output.columns, &output.groups)?;
                }
            }
        }
    }

    Ok(())
}

fn print_summary(settings: &Settings, config: &Path) {
    let locations = settings.locations();
    let filters = settings.filters().enabled_names();

    println!("Config {} is valid", config.display());
    println!("  search keys: {}", settings.search_keys.join(", "));
    println!("  radius:      {} miles", settings.radius);
    println!("  rate limit:  {}s per call", settings.api_rate_limit);
    println!("  locations:   {}", locations.len());
    for location in &locations {
        println!("    {location}");
    }
    println!(
        "  filters:     {}",
        if filters.is_empty() {
            "none".to_string()
        } else {
            filters.join(", ")
        }
    );
    println!("  dedupe:      {}", settings.dedupe);
    println!("  datastore:   {}", settings.datastore_path(config).display());
}
