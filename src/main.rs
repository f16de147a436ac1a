//! setu-relay daemon entry point

use setu_relay::app::RelayApp;
use setu_relay::{AppConfig, Result};
use std::env;
use std::path::Path;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu-relay <path>` (positional)
/// - `setu-relay --config <path>` (flag-based)
/// - `setu-relay -c <path>` (short flag)
///
/// Defaults to `/etc/setu-relay.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/setu-relay.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = if Path::new(&config_path).exists() {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::rover_defaults()
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    log::info!("setu-relay v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);
    log::info!(
        "UDP {}  UART {} @ {}",
        config.network.listen_address,
        config.uart.port,
        config.uart.baud
    );

    let mut app = RelayApp::new(config);
    app.run()
}
