mod config;
mod gateway;
mod policy;
mod script;
mod table;
mod workbench;
mod workshop;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::workshop::Workshop;

fn print_help() {
    println!(
        "\
sentinel-runner v{}

Secure code runner: executes approved data-transformation scripts in a
capability-restricted workbench. Intended to run inside a network-disabled
container, reachable only from the approval UI.

USAGE:
    sentinel-runner [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: config/runner.toml]

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG    Log level filter for tracing
                (e.g. debug, sentinel_runner=debug,warn)

EXAMPLES:
    sentinel-runner                            # uses config/runner.toml
    sentinel-runner /etc/sentinel/runner.toml  # custom config path
    RUST_LOG=debug sentinel-runner             # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("sentinel-runner v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Initialize logging (RUST_LOG=debug for debug mode)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sentinel_runner=info")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/runner.toml".to_string());

    info!("Loading configuration from {config_path}");
    let config = Config::load(&config_path)?;

    info!("Bind address: {}:{}", config.server.host, config.server.port);
    info!(
        "Limits: {}ms wall clock, {} ops, {} cells, {} output cells",
        config.limits.timeout_ms,
        config.limits.max_fuel,
        config.limits.max_cells,
        config.limits.max_output_cells
    );
    info!(
        "Workers: {} concurrent, {}ms queue wait",
        config.gateway.max_concurrent, config.gateway.queue_wait_ms
    );

    // Build the workshop registry before the first request arrives
    let workshop = Workshop::global();
    info!(
        "Workshop: {} libraries preloaded ({})",
        workshop.len(),
        workshop.names().join(", ")
    );

    gateway::serve(config).await
}
