// crates/gapool-daemon/src/main.rs
//
// Binary entrypoint for the Gapool dispatch daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, connects
// the dispatch state to the chain node, spawns the poll loop, and serves
// miners until the listener fails or the process is interrupted.

mod chain;
mod config;

use std::sync::Arc;

use clap::Parser;

use chain::NodeRpcClient;
use config::DaemonConfig;
use gapool_rpc::{run_poll_loop, DispatchServer, DispatchState};

/// Gapool daemon: hands out proof-of-work jobs to miners and relays their
/// solutions to the chain node.
#[derive(Parser, Debug)]
#[command(name = "gapool-daemon", version = "0.1.0", about = "Gapool mining dispatch daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.gapool/config.toml")]
    config: String,

    /// Listen address as host:port, overriding the config file.
    #[arg(long)]
    listen: Option<String>,

    /// Chain node JSON-RPC URL, overriding the config file.
    #[arg(long)]
    node_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration first so its log level can seed the subscriber.
    let config_path = expand_tilde(&args.config);
    let loaded = DaemonConfig::load(&config_path);
    let mut daemon_config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => DaemonConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .init();

    match loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            config_path,
            e
        ),
    }

    // CLI flags override the config file values.
    if let Some(listen) = &args.listen {
        daemon_config.set_listen(listen)?;
    }
    if let Some(node_url) = args.node_url {
        daemon_config.node_url = node_url;
    }

    tracing::info!("Gapool Daemon v0.1.0");
    tracing::info!(
        "Listening endpoint: {}:{}",
        daemon_config.listen_host,
        daemon_config.listen_port
    );
    tracing::info!("Poll interval: {:?}", daemon_config.poll_interval());

    let node = Arc::new(NodeRpcClient::new(
        &daemon_config.node_url,
        daemon_config.node_user.clone(),
        daemon_config.node_password.clone(),
        daemon_config.upstream_timeout(),
    ));
    tracing::info!("Chain node: {}", node.url());
    let state = Arc::new(DispatchState::new(node, daemon_config.upstream_timeout()));

    let server = DispatchServer::new(daemon_config.server_config(), state.clone());
    // Bind before polling so a taken port fails fast.
    let listener = server.bind().await?;

    let poll_state = state.clone();
    let poll_interval = daemon_config.poll_interval();
    tokio::spawn(async move {
        run_poll_loop(poll_state, poll_interval).await;
    });

    tokio::select! {
        result = server.serve(listener) => {
            if let Err(e) = result {
                tracing::error!("Dispatch server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, shutting down");
        }
    }

    tracing::info!("Gapool daemon shut down after {:?}", state.uptime());

    Ok(())
}

/// Expand a leading `~/` in a path to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde("~/.gapool/config.toml");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, format!("{}/.gapool/config.toml", home.display()));
        }
        assert_eq!(expand_tilde("/etc/gapool.toml"), "/etc/gapool.toml");
    }

    #[test]
    fn cli_overrides_parse() {
        let args = Args::parse_from([
            "gapool-daemon",
            "--listen",
            "127.0.0.1:3000",
            "--node-url",
            "http://node:1",
        ]);
        assert_eq!(args.config, "~/.gapool/config.toml");
        assert_eq!(args.listen.as_deref(), Some("127.0.0.1:3000"));
        assert_eq!(args.node_url.as_deref(), Some("http://node:1"));
    }
}
