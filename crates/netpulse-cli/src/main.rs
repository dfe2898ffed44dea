//! CLI for netpulse: SNMP health polling with InfluxDB persistence.
//!
//! Device and store settings come from the environment (`SNMP_*`,
//! `INFLUX_*`, `POLL_*`); flags cover what changes per invocation.

mod commands;

use clap::{Parser, Subcommand};
use netpulse_core::MonitorConfig;

#[derive(Parser)]
#[command(name = "netpulse")]
#[command(about = "netpulse: SNMP health polling with aligned time-series history")]
#[command(version = netpulse_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling scheduler and the HTTP API until Ctrl-C
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port
        #[arg(long, default_value = "5000")]
        port: u16,

        /// Keep samples in memory instead of InfluxDB (nothing survives restart)
        #[arg(long)]
        memory_store: bool,
    },

    /// Collect one snapshot and show what would be persisted
    Poll {
        /// Persist the usable fields to the configured store
        #[arg(long)]
        write: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print aligned CPU/RAM history from the store
    History {
        /// Window length in hours (1-720)
        #[arg(long, default_value = "24")]
        hours: u32,

        /// Newest point first
        #[arg(long)]
        desc: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the metric catalog (name and OID)
    Catalog,

    /// Check that the device answers a single query
    Probe,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = MonitorConfig::from_env;

    match cli.command {
        Commands::Serve {
            host,
            port,
            memory_store,
        } => commands::serve::run(config()?, &host, port, memory_store),
        Commands::Poll { write, json } => commands::poll::run(config()?, write, json),
        Commands::History { hours, desc, json } => {
            commands::history::run(config()?, hours, desc, json)
        }
        Commands::Catalog => {
            commands::catalog::run();
            Ok(())
        }
        Commands::Probe => commands::probe::run(config()?),
    }
}
