//! `dispatchd`: serve, validate or dry-run a request dispatch configuration.
//!
//! Without `--config` the daemon runs a built-in configuration: the
//! conventional `$Controller//$Action/$ID/$OtherID` rule plus
//! `EchoController` answering the root URL.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::Method;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::net::TcpListener;

use request_dispatch::config::{load_config, ConfigWatcher, DispatchConfig, RuleConfig};
use request_dispatch::dispatch::{Director, RoutingTable};
use request_dispatch::handler::builtin::{echo_controller, ECHO_CONTROLLER};
use request_dispatch::handler::RegistryBuilder;
use request_dispatch::http::{DispatchServer, HttpRequest};
use request_dispatch::observability;
use request_dispatch::routing::Rule;

#[derive(Parser)]
#[command(name = "dispatchd")]
#[command(about = "URL routing and request dispatch daemon", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for changes while serving
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve HTTP (default)
    Serve,
    /// Validate the configuration and build the routing table
    Check,
    /// Show which global rule a request would be routed through
    Route {
        /// HTTP method, e.g. GET
        method: String,
        /// Request URL, e.g. /admin/pages/edit/4
        url: String,
    },
}

const CONTROLLER_RULE: &str = "$Controller//$Action/$ID/$OtherID";

fn base_registry() -> RegistryBuilder {
    let mut builder = RegistryBuilder::with_builtins();
    builder.register(echo_controller());
    builder
}

fn builtin_config() -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.director.rules = vec![
        RuleConfig {
            pattern: CONTROLLER_RULE.to_string(),
            ..Default::default()
        },
        RuleConfig {
            pattern: String::new(),
            controller: Some(ECHO_CONTROLLER.to_string()),
            ..Default::default()
        },
    ];
    config
}

fn read_config(path: Option<&Path>) -> Result<DispatchConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(builtin_config()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = read_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, cli.config).await,
        Commands::Check => {
            let table = RoutingTable::from_config(&base_registry(), &config)?;
            println!(
                "Configuration OK: {} rules, {} handler types",
                table.rules().len(),
                table.registry().len()
            );
            Ok(())
        }
        Commands::Route { method, url } => {
            let table = RoutingTable::from_config(&base_registry(), &config)?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let request = HttpRequest::builder(method, &url).build()?;
            let report = match table.probe(&request) {
                Some(matched) => json!({
                    "rule": matched.rule.pattern().as_str(),
                    "target": matched.rule.target(),
                    "params": matched.params,
                }),
                None => json!({ "rule": null, "error": "No URL rule was matched" }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(config: DispatchConfig, path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    observability::init_logging(&config.observability);
    tracing::info!("dispatchd v{} starting", env!("CARGO_PKG_VERSION"));

    let director = Arc::new(Director::from_config(base_registry(), &config)?);
    tracing::info!(
        bind_address = %config.server.bind_address,
        rules = director.table().rules().len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = DispatchServer::new(Arc::clone(&director), &config.server);

    // Held for the lifetime of the server; dropping it stops the watch.
    let _watcher = match path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            server.spawn_reloader(updates);
            Some(watcher.run()?)
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
