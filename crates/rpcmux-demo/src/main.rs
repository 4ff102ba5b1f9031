//! rpcmux demo - multiplexed services over HTTP.
//!
//! `serve` hosts the `Calculator` and `WeatherReport` services behind one HTTP
//! endpoint; `call` invokes one of them through a multiplexed client.

mod client;
mod handler;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpcmux_http::HttpServerConfig;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rpcmux-demo")]
#[command(about = "Multiplexed Calculator and WeatherReport services over HTTP")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve both services until Ctrl-C
    Serve {
        /// Port to listen on (0 = auto-assign)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<IpAddr>,

        /// Answer CORS preflight requests
        #[arg(long)]
        cors: bool,

        /// JSON server config file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Invoke one call on a running server
    Call {
        /// Server endpoint
        #[arg(long, default_value = "http://127.0.0.1:9090/")]
        url: String,

        #[command(subcommand)]
        call: CallCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CallCommand {
    /// Calculator.add(a, b)
    #[command(allow_negative_numbers = true)]
    Add { a: i32, b: i32 },
    /// Calculator.subtract(a, b)
    #[command(allow_negative_numbers = true)]
    Subtract { a: i32, b: i32 },
    /// WeatherReport.get_temperature()
    Temperature,
}

impl From<CallCommand> for client::DemoCall {
    fn from(command: CallCommand) -> Self {
        match command {
            CallCommand::Add { a, b } => client::DemoCall::Add(a, b),
            CallCommand::Subtract { a, b } => client::DemoCall::Subtract(a, b),
            CallCommand::Temperature => client::DemoCall::Temperature,
        }
    }
}

fn init_logging(debug: bool, json: bool) {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    // Logs go to stderr; stdout carries RPC_PORT= and call results.
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn load_config(path: Option<&Path>) -> Result<HttpServerConfig> {
    let Some(path) = path else {
        return Ok(HttpServerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

async fn serve(
    port: Option<u16>,
    host: Option<IpAddr>,
    cors: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(host) = host {
        config.addr.set_ip(host);
    }
    if let Some(port) = port {
        config.addr.set_port(port);
    }
    if cors {
        config.cors_enabled = true;
    }

    info!("Starting rpcmux demo server");
    let mut handle = server::start_server(config).await?;

    // Print port for parent processes to read (intentional stdout)
    println!("RPC_PORT={}", handle.addr().port());

    info!("Demo server running on {}", handle.addr());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    handle.shutdown();
    handle.stopped().await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug, args.log_json);

    match args.command {
        Command::Serve {
            port,
            host,
            cors,
            config,
        } => serve(port, host, cors, config).await,
        Command::Call { url, call } => {
            let call = client::DemoCall::from(call);
            let value = tokio::task::spawn_blocking(move || client::invoke(&url, call)).await??;
            println!("{}", value);
            Ok(())
        }
    }
}
