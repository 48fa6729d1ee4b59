// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use fetchbridge::config::{ClientConfig, Config};
use fetchbridge::driver::{self, ClientFactory, ItemChange};
use fetchbridge::error::{DownloadClientError, ErrorBuilder};
use fetchbridge::parser::SceneTitleParser;
use fetchbridge::types::{DownloadClientItem, DownloadItemStatus, ReleaseInfo};
use fetchbridge::validation::ValidationFailure;
use fetchbridge::ConfiguredClient;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Service unavailable - a download client could not be reached
    pub const SERVICE_UNAVAILABLE: i32 = 69;
    /// Configuration error - invalid or missing config
    pub const CONFIG: i32 = 78;
}

use exit_codes::*;

#[derive(Parser)]
#[command(name = "fetchbridge")]
#[command(version = VERSION)]
#[command(about = "One item model for every download manager.")]
#[command(long_about = "fetchbridge - Download client integration\n\n\
    List items:        fetchbridge items\n\
    Check clients:     fetchbridge test\n\
    Follow changes:    fetchbridge watch\n\n\
    Clients are configured in ~/.fetchbridge/config.json.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $FETCHBRIDGE_CONFIG or ~/.fetchbridge/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose mode: debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List items reported by the download clients
    Items {
        /// Only this client
        #[arg(short, long)]
        client: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show where each client writes its output
    Status,
    /// Validate every configured client
    Test,
    /// Send a release to a client
    ///
    /// Examples:
    ///   fetchbridge download --client NZBGet --url https://indexer/nzb/1 --title Show.S01E01.720p
    Download {
        #[arg(short, long)]
        client: String,
        /// URL of the NZB file
        #[arg(long)]
        url: String,
        /// Release title, also used as the file name
        #[arg(long)]
        title: String,
        /// Use the priority for recently aired releases
        #[arg(long)]
        recent: bool,
    },
    /// Remove an item from the client's history
    Remove {
        #[arg(short, long)]
        client: String,
        id: String,
    },
    /// Ask the client to download an item again
    Retry {
        #[arg(short, long)]
        client: String,
        id: String,
    },
    /// Poll all clients and print changes until Ctrl-C
    Watch {
        /// Poll interval in seconds (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{}",
                ErrorBuilder::new(format!("Invalid config file: {}", config_path.display()))
                    .cause(format!("{:#}", e))
                    .fix("Check the JSON syntax and the client settings")
                    .build()
            );
            std::process::exit(CONFIG);
        }
    };

    // Blocking HTTP clients must be created outside the async runtime
    let factory = ClientFactory::with_defaults(
        Arc::new(SceneTitleParser::new()),
        Duration::from_secs(config.download_timeout_secs),
    )
        .context("Failed to initialize download client transports")?;

    let code = match cli.command {
        Commands::Items { client, json } => list_items(&factory, &config, client.as_deref(), json)?,
        Commands::Status => show_status(&factory, &config),
        Commands::Test => test_clients(&factory, &config),
        Commands::Download {
            client,
            url,
            title,
            recent,
        } => {
            let client = find_client(&factory, &config, &client);
            let release = ReleaseInfo::usenet(title, url).recent(recent);
            match client.download(&release) {
                Ok(Some(id)) => {
                    println!("{} Sent to {} (id {})", "[✓]".green(), client.name(), id.bold());
                    0
                }
                Ok(None) => {
                    println!("{} Sent to {}", "[✓]".green(), client.name());
                    0
                }
                Err(e) => report_error(client.name(), &e),
            }
        }
        Commands::Remove { client, id } => {
            let client = find_client(&factory, &config, &client);
            match client.remove_item(&id) {
                Ok(()) => {
                    println!("{} Removed {} from {}", "[✓]".green(), id, client.name());
                    0
                }
                Err(e) => report_error(client.name(), &e),
            }
        }
        Commands::Retry { client, id } => {
            let client = find_client(&factory, &config, &client);
            match client.retry_download(&id) {
                Ok(()) => {
                    println!("{} Retrying {} on {}", "[✓]".green(), id, client.name());
                    0
                }
                Err(e) => report_error(client.name(), &e),
            }
        }
        Commands::Watch { interval } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            runtime.block_on(driver::watch(
                &factory,
                &config_path,
                interval.map(Duration::from_secs),
                print_change,
            ))?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Resolve a client by name, exiting with a config error when it is unknown.
fn find_client(factory: &ClientFactory, config: &Config, name: &str) -> Arc<dyn ConfiguredClient> {
    match config.client(name) {
        Some(client) => factory.build(client),
        None => {
            let known: Vec<&str> = config.clients.iter().map(ClientConfig::name).collect();
            eprintln!(
                "{}",
                ErrorBuilder::new(format!("Unknown download client: {}", name))
                    .cause(format!("Configured clients: {}", if known.is_empty() { "none".to_string() } else { known.join(", ") }))
                    .fix("Check the name with: fetchbridge status")
                    .build()
            );
            std::process::exit(CONFIG);
        }
    }
}

fn report_error(client: &str, error: &DownloadClientError) -> i32 {
    let builder = ErrorBuilder::new(format!("{}: {}", client, error));

    let (builder, code) = match error {
        DownloadClientError::Unreachable(_) => (
            builder
                .cause("The download client is not running")
                .cause("Wrong host or port in the config")
                .fix("Check the client settings with: fetchbridge test"),
            SERVICE_UNAVAILABLE,
        ),
        DownloadClientError::AuthenticationFailed(_) => (
            builder.fix("Check the username and password in the config"),
            CONFIG,
        ),
        _ => (builder, ERROR),
    };

    eprintln!("{}", builder.build());
    code
}

fn list_items(factory: &ClientFactory, config: &Config, only: Option<&str>, json: bool) -> Result<i32> {
    let clients: Vec<Arc<dyn ConfiguredClient>> = match only {
        Some(name) => vec![find_client(factory, config, name)],
        None => factory.build_all(config),
    };

    let mut all_items = Vec::new();
    let mut code = 0;

    for client in &clients {
        match client.fetch_items() {
            Ok(items) => all_items.extend(items),
            Err(e) => code = report_error(client.name(), &e),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all_items).context("Failed to serialize items")?);
        return Ok(code);
    }

    if all_items.is_empty() {
        println!("{}", "No items".dimmed());
    }
    for item in &all_items {
        print_item(item);
    }

    Ok(code)
}

fn print_item(item: &DownloadClientItem) {
    let status = match item.status {
        DownloadItemStatus::Queued => item.status.as_str().normal(),
        DownloadItemStatus::Downloading => item.status.as_str().cyan(),
        DownloadItemStatus::Paused => item.status.as_str().yellow(),
        DownloadItemStatus::Completed => item.status.as_str().green(),
        DownloadItemStatus::Failed => item.status.as_str().red(),
    };

    let eta = item
        .remaining_time
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());

    println!(
        "{:<12} {:<10} {:>10} {:>10}  {}  {}",
        status,
        item.download_client,
        format_bytes(item.remaining_size),
        eta,
        item.title.bold(),
        item.download_client_id.dimmed()
    );

    if let Some(message) = &item.message {
        println!("{:>36}{}", "", message.dimmed());
    }
}

fn show_status(factory: &ClientFactory, config: &Config) -> i32 {
    let mut code = 0;

    for client in factory.build_all(config) {
        match client.get_status() {
            Ok(status) => {
                let location = if status.is_localhost { "local" } else { "remote" };
                println!("{} {} ({}, {})", "[✓]".green(), client.name().bold(), client.implementation(), location);
                for folder in &status.output_root_folders {
                    println!("    {}", folder.display());
                }
            }
            Err(e) => code = report_error(client.name(), &e),
        }
    }

    code
}

fn test_clients(factory: &ClientFactory, config: &Config) -> i32 {
    let mut code = 0;

    for client_config in &config.clients {
        let name = client_config.name();
        let mut failures: Vec<ValidationFailure> = client_config.validate_settings();

        if failures.is_empty() {
            failures.extend(factory.build(client_config).validate().failures);
        }

        if failures.is_empty() {
            println!("{} {}", "[✓]".green(), name.bold());
            continue;
        }

        code = CONFIG;
        for failure in failures {
            let mut builder = ErrorBuilder::new(format!("{}: {}", name, failure));
            if let Some(description) = &failure.detailed_description {
                builder = builder.cause(description.as_str());
            }
            if let Some(link) = &failure.info_link {
                builder = builder.fix(format!("Open {}", link));
            }
            eprintln!("{}", builder.build());
        }
    }

    code
}

fn print_change(change: &ItemChange) {
    let line = change.to_string();
    match change {
        ItemChange::Added(_) => println!("{}", line.cyan()),
        ItemChange::StatusChanged { to: DownloadItemStatus::Failed, .. } => println!("{}", line.red()),
        ItemChange::StatusChanged { to: DownloadItemStatus::Completed, .. } => println!("{}", line.green()),
        ItemChange::StatusChanged { .. } => println!("{}", line),
        ItemChange::Removed(_) => println!("{}", line.dimmed()),
    }
}

fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes.max(0))
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_500_000_000), "1.4 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3720)), "1h02m");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["fetchbridge", "--verbose", "items", "--client", "NZBGet", "--json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Items { json: true, .. }));
    }
}
