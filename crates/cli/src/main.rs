//! swcache-ctl: control a running swcache host from the page side.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use url::Url;

mod controller;
mod sse;

use controller::{Connectivity, Controller, describe_event, describe_reply};

#[derive(Parser, Debug)]
#[command(name = "swcache-ctl")]
#[command(about = "Talk to a running swcache host")]
#[command(version)]
struct Args {
    /// Base URL of the host
    #[arg(long, env = "SWCACHE_CTL_HOST", default_value = "http://127.0.0.1:8080/")]
    host: Url,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a page with the host and print its client id
    Register {
        /// Page URL
        url: String,
        /// Reuse an existing client id
        #[arg(long)]
        id: Option<String>,
    },
    /// Print broadcasts from the host until interrupted
    Watch,
    /// Show the deployed version
    Version,
    /// List stores with their entry counts
    Info,
    /// Delete every store
    Clear,
    /// Activate a waiting version now
    SkipWaiting,
    /// Report whether the host is reachable
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let controller = Controller::new(args.host, Duration::from_millis(args.timeout_ms))?;

    match args.command {
        Command::Register { url, id } => {
            println!("{}", controller.register(id.as_deref(), &url).await?);
        }
        Command::Watch => {
            controller
                .watch(|event| println!("{}", describe_event(&event)))
                .await?;
        }
        Command::Version => print_reply(&controller, "CHECK_VERSION").await?,
        Command::Info => print_reply(&controller, "GET_CACHE_INFO").await?,
        Command::Clear => print_reply(&controller, "CLEAR_CACHE").await?,
        Command::SkipWaiting => print_reply(&controller, "SKIP_WAITING").await?,
        Command::Status => match controller.check_health().await {
            Connectivity::Online { version, state } => {
                println!(
                    "online (version {}, {})",
                    version.as_deref().unwrap_or("none"),
                    state.as_deref().unwrap_or("no engine")
                );
            }
            Connectivity::Offline(reason) => {
                println!("offline: {reason}");
                return Ok(ExitCode::FAILURE);
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

async fn print_reply(controller: &Controller, message_type: &str) -> Result<()> {
    match controller.send(message_type).await? {
        Some(reply) => println!("{}", describe_reply(&reply)),
        None => println!("ok"),
    }
    Ok(())
}
