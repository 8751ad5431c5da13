use std::net::SocketAddr;

use axum::Router;
use axum::http::Method;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use anyhow::anyhow;

use sonic_gateway::{AppState, ServerConfig, routes};

/// Sonic Gateway - Real-time voice conversation server
#[derive(Parser, Debug)]
#[command(name = "sonic-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host to bind, overriding HOST from the environment
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding PORT from the environment
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse CLI arguments and load configuration
    let cli = Cli::parse();
    let mut config = ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let address = config.address();
    println!("Starting server on {address}");

    // Create application state (builds the upstream connector)
    let app_state = AppState::new(config).await;

    // Start the idle-session sweeper
    let _sweeper = app_state.manager.spawn_idle_sweeper();

    // Browser clients connect cross-origin during development; the voice
    // endpoint carries no credentials, so a permissive CORS policy is fine.
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    let public_routes = Router::new().route(
        "/",
        axum::routing::get(sonic_gateway::handlers::api::health_check),
    );

    let app = public_routes
        .merge(routes::create_voice_router())
        .with_state(app_state)
        .layer(cors_layer);

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    info!("Server listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
