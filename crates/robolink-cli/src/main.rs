//! Robolink CLI - inspect and poke a running simulation station.
//!
//! Results are printed to stdout as JSON, one document per line; logs go to
//! stderr.

mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use robolink::LinkConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "robolink-cli")]
#[command(about = "Command-line client for a robot simulation station")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Station host
    #[arg(long)]
    host: Option<String>,

    /// First port to try
    #[arg(short, long)]
    port: Option<u16>,

    /// Last port to try (defaults to --port)
    #[arg(long)]
    port_end: Option<u16>,

    /// Default call timeout in seconds
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Station executable used when auto-launching
    #[arg(long)]
    exe: Option<PathBuf>,

    /// Show the station window when auto-launching
    #[arg(long)]
    show: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and print station version details
    Info,
    /// Look up an item by name
    Item {
        name: String,
        /// Restrict the lookup to this item type code
        #[arg(long = "type")]
        item_type: Option<i32>,
    },
    /// List all items
    Items {
        /// Only list items of this type code
        #[arg(long = "type")]
        item_type: Option<i32>,
    },
    /// Read a station parameter
    Param { name: String },
    /// Set a station parameter
    SetParam { name: String, value: String },
    /// Send a special command and print the answer
    Command { name: String, value: String },
    /// Stream events until interrupted
    Events,
}

impl Args {
    fn link_config(&self) -> Result<LinkConfig> {
        let mut config = match &self.config {
            Some(path) => LinkConfig::from_json_file(path)?,
            None => LinkConfig::new(),
        };

        if let Some(host) = &self.host {
            config = config.with_host(host.clone());
        }
        if let Some(port) = self.port {
            config = config.with_port_range(port, self.port_end.unwrap_or(port));
        } else if let Some(end) = self.port_end {
            let start = config.port_start;
            config = config.with_port_range(start, end);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_default_timeout(Duration::try_from_secs_f64(secs)?);
        }
        if let Some(exe) = &self.exe {
            config = config.with_executable(exe);
        }
        if self.show {
            config = config.with_start_hidden(false);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = args.link_config()?;
    debug!("Using config {:?}", config);

    run::execute(config, args.command).await
}
