use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use game_gateway::config::{AuthPolicy, NetworkConfig};
use game_gateway::error::Result;
use game_gateway::protocol::Dispatcher;
use game_gateway::store::TokenCache;
use game_gateway::transport::Server;
use game_gateway::utils::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "game-gateway", version, about = "Persistent-connection TCP gateway for game clients")]
struct Cli {
    /// TOML configuration file; defaults plus GAME_GATEWAY_* variables when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration
    #[arg(short, long)]
    address: Option<String>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", NetworkConfig::example_config());
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be up yet
            eprintln!("game-gateway: {e}");
            error!(error = %e, "Gateway exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = NetworkConfig::from_file(path)?;
            config.apply_env_overrides()?;
            config
        }
        None => NetworkConfig::from_env()?,
    };
    if let Some(address) = cli.address {
        config.server.address = address;
    }
    config.validate_strict()?;

    init_logging(&config.logging)?;
    info!(
        address = %config.server.address,
        auth_policy = ?config.server.auth_policy,
        "Starting game gateway"
    );

    for warning in standalone_warnings(&config) {
        warn!("{warning}");
    }

    let cache = Arc::new(TokenCache::from_config(&config.cache));
    let dispatcher = Arc::new(Dispatcher::with_builtin_commands(cache)?);

    Server::new(config.server, dispatcher).start().await
}

/// Settings that cannot work when the gateway runs on its own.
///
/// The binary never issues tokens, so under `login_command` no login can
/// succeed and every session ends at the auth timeout.
fn standalone_warnings(config: &NetworkConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.server.auth_policy == AuthPolicy::LoginCommand {
        warnings.push(format!(
            "auth_policy = \"login_command\" but nothing issues tokens into the cache; \
             every session will be closed after {:?}",
            config.server.auth_timeout
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_command_without_token_source_warns() {
        let mut config = NetworkConfig::default();
        assert!(standalone_warnings(&config).is_empty());

        config.server.auth_policy = AuthPolicy::LoginCommand;
        let warnings = standalone_warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("login_command"));
    }
}
