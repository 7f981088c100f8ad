use std::sync::Arc;

use anyhow::{Context, Result};
use comment_server::{build_router, config::AppConfig, state::AppState};
use comment_store::{CommentRepository, CommentStore, MemoryExecutor};
use comment_store_postgres::{PgCommentRepository, RepositoryConnection};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let comments = open_repository(&config).await?;

    let app = build_router(AppState::new(comments), &config.static_dir);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(
        bind_addr = %config.bind_addr,
        static_dir = %config.static_dir.display(),
        "comment server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn open_repository(config: &AppConfig) -> Result<Arc<dyn CommentRepository>> {
    let Some(url) = &config.database_url else {
        warn!("DSN is not set, comments are kept in memory");
        return Ok(Arc::new(CommentStore::new(MemoryExecutor::new())));
    };

    let repository = PgCommentRepository::connect(url)
        .await
        .context("failed opening connection to postgres")?;
    repository
        .initialize()
        .await
        .context("failed creating schema resources")?;

    Ok(Arc::new(repository))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("comment_server=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
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
