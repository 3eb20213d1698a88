use anyhow::Result;
use std::sync::Arc;

use carrier_relay::auth::AuthManager;
use carrier_relay::config::{Config, LogFormat};
use carrier_relay::{middleware, routes};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;

    init_logging(&config);
    install_panic_hook();

    tracing::info!("🚀 Carrier Relay starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    // Restore the last persisted credential pair, or seed the store
    tracing::info!("Initializing authentication...");
    let store = config.credential_store();
    let auth_manager = Arc::new(AuthManager::bootstrap(&config.auth_settings(), store).await?);

    if auth_manager.durability_enabled() {
        tracing::info!("✅ Credential persistence enabled");
    } else {
        tracing::warn!("Credential persistence disabled; rotated tokens will be lost on restart");
    }

    let config = Arc::new(config);
    let app_state = routes::AppState::new(config.clone(), auth_manager)?;
    tracing::info!("✅ HTTP clients initialized");

    // Build the application with routes and middleware
    let app = build_app(app_state.clone());

    // Bind to configured host and port
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Print startup banner
    print_startup_banner(&app_state);

    // Start server with graceful shutdown
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server shutdown complete");

    Ok(())
}

/// Initialize logging; `RUST_LOG` overrides `LOG_LEVEL`
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .init();
        }
    }
}

/// A panic anywhere is logged and ends the process with status 1
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("Unhandled panic: {}", info);
        std::process::exit(1);
    }));
}

/// Build the application with all routes and middleware
fn build_app(state: routes::AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    // Health check routes (no auth required)
    let health_routes = routes::health_routes();

    // Slack routes (signature verified)
    let slack_routes = routes::slack_routes(state.clone());

    // Diagnostic routes (API key, non-production only)
    let diagnostic_routes = routes::diagnostic_routes(state);

    // Combine all routes
    Router::new()
        .merge(health_routes)
        .merge(slack_routes)
        .merge(diagnostic_routes)
        // Apply middleware stack: CORS → Trace → Request id (outermost)
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
}

/// Print startup banner
fn print_startup_banner(state: &routes::AppState) {
    let config = &state.config;
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║                  🚚 Carrier Relay                         ║
║                                                           ║
║  MyCarrierPortal risk assessments for Slack               ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:      http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Carrier API: {}", config.carrier_api_url);
    println!(
        "  Store:       {}",
        state
            .auth_manager
            .store()
            .map(|store| store.describe())
            .unwrap_or_else(|| "none (seed pair only)".to_string())
    );
    println!(
        "  Webhook:     {}",
        if state.responder.has_webhook() {
            "configured"
        } else {
            "response_url only"
        }
    );
    println!(
        "  Diagnostics: {}",
        if config.is_production() {
            "hidden"
        } else if config.test_api_key.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Log Level:   {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
