//! Party Quiz Back binary entrypoint wiring REST, WebSocket, SSE and the session store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use party_quiz_back::{
    config::AppConfig,
    dao::{
        session_store::{SessionStore, memory::MemorySessionStore},
        storage::StorageError,
    },
    routes,
    services::{presenter_service, storage_supervisor, timer_service},
    state::{AppState, SharedState},
};

/// Storage backend picked with `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreBackend {
    Memory,
    #[cfg(feature = "couch-store")]
    Couch,
    #[cfg(feature = "mongo-store")]
    Mongo,
}

impl StoreBackend {
    fn from_env() -> anyhow::Result<Self> {
        let raw = env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into());
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(Self::Couch),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Ok(Self::Mongo),
            other => bail!("unsupported STORE_BACKEND `{other}`"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = StoreBackend::from_env()?;
    let app_state = AppState::new(config);
    info!(
        room_code = %app_state.session_document().room_code,
        backend = ?backend,
        "session coordinator starting"
    );

    tokio::spawn(storage_supervisor::watch_degraded(app_state.clone()));
    tokio::spawn(presenter_service::bootstrap_when_ready(app_state.clone()));
    spawn_storage(app_state.clone(), backend);
    tokio::spawn(timer_service::run(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the selected backend.
fn spawn_storage(state: SharedState, backend: StoreBackend) {
    match backend {
        StoreBackend::Memory => {
            let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "couch-store")]
        StoreBackend::Couch => {
            use party_quiz_back::dao::session_store::couchdb::{CouchConfig, CouchSessionStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchSessionStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn SessionStore>)
            }));
        }
        #[cfg(feature = "mongo-store")]
        StoreBackend::Mongo => {
            use party_quiz_back::dao::session_store::mongodb::{MongoConfig, MongoSessionStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoSessionStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn SessionStore>)
            }));
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
