use std::net::SocketAddr;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use userbase::{config, db, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging (stdout + daily rotation under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "userbase.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush
    let _log_guards = (stdout_guard, file_guard);

    // Fail fast: no database file, no server
    let app_cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            error!("Configuration error: {}", e);
            drop(_log_guards);
            std::process::exit(1);
        }
    };
    let db_path = app_cfg.database_path()?;

    // The listener is only built once the database is ready
    let pool = tokio::select! {
        res = db::open(&db_path, app_cfg.database.max_connections, app_cfg.avatar.style) => {
            res.map_err(|e| {
                error!("Failed to initialize database: {:#}", e);
                e
            })?
        }
        _ = shutdown_signal() => {
            info!("Shutdown requested before the database was ready; exiting");
            return Ok(());
        }
    };

    let state = AppState::new(pool.clone(), app_cfg.clone());
    let app = routes::app(state);

    let host = app_cfg.server.host.clone();
    let port = app_cfg.server.port;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    info!("Userbase listening on http://{}{}/health", local, routes::API_PREFIX);
    info!("API endpoints:");
    for (method, path, what) in [
        ("GET", "/users", "List users"),
        ("GET", "/users/{id}", "Get user by id"),
        ("POST", "/users", "Create user"),
        ("PUT", "/users/{id}", "Update user"),
        ("PATCH", "/users/{id}/avatar", "Regenerate avatar"),
        ("DELETE", "/users/{id}", "Delete user"),
        ("GET", "/health", "Health check"),
    ] {
        info!("  {:<6} {}{:<20} - {}", method, routes::API_PREFIX, path, what);
    }
    if app_cfg.api_key().is_some() {
        info!("API key check enabled on /users routes (header: {})", app_cfg.auth.header);
    }

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    db::close(&pool).await;
    info!("Database connection closed");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
