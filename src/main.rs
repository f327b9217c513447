use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc, time::Duration};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use userbase::{
    application::{error::AppError, repos::UsersRepo},
    cache::{CacheService, DisconnectedStore, KeyValueStore, RedisStore, RedisStoreOptions},
    config::{self, Command, Settings},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, HttpOptions},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command_or_default() {
        Command::Serve(_) => run_serve(settings).await,
        Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: Settings) -> Result<(), AppError> {
    let repositories = connect_database(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;
    info!("migrations applied");
    repositories.close().await;
    Ok(())
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let repositories = connect_database(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;

    let (store, redis) = connect_store(&settings).await;
    let cache = CacheService::new(store);

    let repo: Arc<dyn UsersRepo> = Arc::new(repositories.clone());
    let state = ApiState::new(repo, cache, HttpOptions::from(&settings));
    let router = http::build_router(state).map_err(InfraError::from)?;

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        addr = %settings.server.addr,
        environment = %settings.app.environment,
        name = %settings.app.name,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let (drained_tx, drained_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Starts the drain deadline once the signal has arrived.
        let _ = drained_tx.send(());
    })
    .into_future();

    let result = tokio::select! {
        result = server => result.map_err(InfraError::from),
        () = drain_deadline(drained_rx, grace) => {
            warn!(grace_secs = grace.as_secs(), "graceful shutdown timed out, dropping open connections");
            Ok(())
        }
    };

    if let Some(redis) = redis {
        redis.close().await;
    }
    repositories.close().await;
    info!("shutdown complete");

    result.map_err(AppError::from)
}

async fn connect_database(settings: &Settings) -> Result<PostgresRepositories, AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database.url is required"))?;
    let pool = PostgresRepositories::connect(url, &settings.database)
        .await
        .map_err(InfraError::from)?;
    Ok(PostgresRepositories::new(pool))
}

/// Redis when configured and reachable; otherwise a store that always misses.
async fn connect_store(settings: &Settings) -> (Arc<dyn KeyValueStore>, Option<RedisStore>) {
    let Some(url) = settings.redis.url.clone() else {
        warn!("redis.url is not set, every cache lookup will miss");
        return (Arc::new(DisconnectedStore), None);
    };

    let options = RedisStoreOptions {
        url,
        response_timeout: settings.redis.response_timeout,
        connection_timeout: settings.redis.connection_timeout,
    };
    match RedisStore::connect(&options).await {
        Ok(store) => (Arc::new(store.clone()), Some(store)),
        Err(err) => {
            warn!(error = %err, "redis unavailable at startup, every cache lookup will miss");
            (Arc::new(DisconnectedStore), None)
        }
    }
}

async fn drain_deadline(signalled: tokio::sync::oneshot::Receiver<()>, grace: Duration) {
    if signalled.await.is_err() {
        // Server finished without a signal; never fire.
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
