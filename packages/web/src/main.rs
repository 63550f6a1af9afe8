use std::net::SocketAddr;

use anyhow::Context;
use api::db::{get_pool, migrate, PgStore};
use api::settings::ServerSettings;
use api::{router, AppState, Settings};
use axum::Router;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("failed to load settings")?;
    let app = build_app(&settings).await?;

    let address = settings.server.addr();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn build_app(settings: &Settings) -> anyhow::Result<Router> {
    if settings.database.url.is_none() {
        warn!("no database url configured, all state is kept in memory");
        let state = AppState::new(store::MemoryStore::new(), settings.policy.clone());
        let sessions = session_layer(tower_sessions::MemoryStore::default(), &settings.server)?;
        return Ok(router(state).layer(sessions));
    }

    let pool = get_pool(&settings.database)
        .await
        .context("failed to connect to database")?;
    migrate(pool).await.context("failed to run migrations")?;

    let session_store = PostgresStore::new(pool.clone());
    session_store
        .migrate()
        .await
        .context("failed to migrate session store")?;

    let state = AppState::new(PgStore::new(pool.clone()), settings.policy.clone());
    Ok(router(state).layer(session_layer(session_store, &settings.server)?))
}

fn session_layer<S: SessionStore + Clone>(
    store: S,
    server: &ServerSettings,
) -> anyhow::Result<SessionManagerLayer<S>> {
    let inactivity = server
        .session_ttl()
        .with_context(|| format!("session_days {} is too large", server.session_days))?;
    Ok(SessionManagerLayer::new(store)
        .with_secure(server.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(inactivity.try_into()?)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
