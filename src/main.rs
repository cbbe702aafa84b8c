use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::audit::JsonLinesStore;
use api_gateway::config::{load_config, load_routes, GatewayConfig};
use api_gateway::lifecycle::{forward_signals, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::Gateway;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Configuration-driven API gateway with audit logging", long_about = None)]
struct Args {
    /// Gateway settings (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Route table (JSON). Overrides `routes_path` from the settings.
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Listen address. Overrides `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// HMAC secret for bearer tokens. Overrides `auth.secret`.
    #[arg(long, env = "GATEWAY_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if let Some(secret) = args.jwt_secret {
        config.auth.secret = secret;
    }

    logging::init(&config.observability);
    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let routes_path = args
        .routes
        .unwrap_or_else(|| PathBuf::from(&config.routes_path));
    let routes = load_routes(&routes_path, &config)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = %routes_path.display(),
        audit_path = %config.audit.path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = JsonLinesStore::open(&config.audit.path).await?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let gateway = Gateway::new(config, &routes, Arc::new(store))?;

    let shutdown = Shutdown::new();
    forward_signals(&shutdown);
    gateway.run(listener, shutdown.subscribe()).await?;

    tracing::info!(dropped_audit_records = gateway.audit().dropped(), "Shutdown complete");
    Ok(())
}
