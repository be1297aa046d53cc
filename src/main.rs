//! rf_daq command line
//!
//! ```text
//! rf_daq models
//! rf_daq --config bench.toml identify vna
//! rf_daq set fsv center 2.4e9
//! rf_daq snapshot vna --update
//! rf_daq --init identify vna
//! rf_daq params fsv
//! ```
use anyhow::Context;
use clap::{Parser, Subcommand};
use rf_daq::config::RfDaqConfig;
use rf_daq::parameter::ParamValue;
use rf_daq::registry::{self, OpenMode};
use rf_daq::validators::Validator;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rf_daq", version, about = "SCPI control of RF analyzers")]
struct Cli {
    /// Instrument configuration file
    #[arg(short, long, default_value = rf_daq::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (overrides the configuration; RUST_LOG overrides both)
    #[arg(long)]
    log_level: Option<String>,

    /// Reset and set up instruments as configured before running the command
    #[arg(long, global = true)]
    init: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported models and their frequency ranges
    Models,
    /// List configured instruments
    List,
    /// Print the resolved configuration as TOML
    Config,
    /// Connect and print identity and options
    Identify { id: String },
    /// List parameters with access flags and accepted values
    Params { id: String },
    /// Read a parameter (e.g. `start` or `channel1.npts`)
    Get { id: String, param: String },
    /// Write a parameter
    Set {
        id: String,
        param: String,
        value: String,
    },
    /// Print every parameter as JSON
    Snapshot {
        id: String,
        /// Query the instrument instead of reporting cached values
        #[arg(long)]
        update: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = RfDaqConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.application.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.init {
        OpenMode::Configure
    } else {
        OpenMode::Attach
    };

    match cli.command {
        Command::Models => {
            for (driver, row) in registry::supported_models() {
                println!(
                    "{:<8} {:<8} {:>14} Hz {:>14} Hz",
                    driver.as_str(),
                    row.model,
                    ParamValue::Float(row.min_hz).to_string(),
                    ParamValue::Float(row.max_hz).to_string()
                );
            }
        }
        Command::List => {
            for instrument in &config.instruments {
                println!(
                    "{:<12} {:<8} {:<8} {}",
                    instrument.id,
                    instrument.driver.as_str(),
                    if instrument.enabled { "enabled" } else { "disabled" },
                    instrument.resource
                );
            }
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Command::Identify { id } => {
            let instrument = registry::open_instrument_as(config.instrument(&id)?, mode).await?;
            println!("{}", serde_json::to_string_pretty(instrument.idn())?);
            println!("options: {}", instrument.options().join(","));
        }
        Command::Params { id } => {
            let instrument = registry::open_instrument_as(config.instrument(&id)?, mode).await?;
            for name in instrument.parameter_names() {
                let parameter = instrument.parameter(&name)?;
                let access = match (parameter.is_gettable(), parameter.is_settable()) {
                    (true, true) => "rw",
                    (true, false) => "r",
                    (false, true) => "w",
                    (false, false) => "-",
                };
                let vals = parameter
                    .validator()
                    .map(Validator::describe)
                    .unwrap_or_default();
                println!("{:<24} {:<2} {}", name, access, vals);
            }
        }
        Command::Get { id, param } => {
            let instrument = registry::open_instrument_as(config.instrument(&id)?, mode).await?;
            let value = instrument.parameter(&param)?.get().await?;
            println!("{}", value);
        }
        Command::Set { id, param, value } => {
            let instrument = registry::open_instrument_as(config.instrument(&id)?, mode).await?;
            instrument
                .parameter(&param)?
                .set(ParamValue::parse_loose(&value))
                .await?;
        }
        Command::Snapshot { id, update } => {
            let instrument = registry::open_instrument_as(config.instrument(&id)?, mode).await?;
            let snapshot = instrument.snapshot(update).await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}
