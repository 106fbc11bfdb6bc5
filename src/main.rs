use anyhow::{Context, Result, bail};
use axum::Router;
use object_transcoder::{
    config::{AppConfig, Backend, Command, ServeConfig},
    routes::routes::{AppState, routes},
    services::{
        codec::GzipCodec,
        irods_store::IrodsStore,
        local_store::LocalStore,
        observer::TracingObserver,
        pipeline::{Action, Transcoder},
        store::ObjectStore,
    },
};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting object-transcoder with config: {:?}", cfg);
    tracing::debug!("Command: {:?}", command);

    if let Command::Migrate = command {
        let store = open_local_store(&cfg).await?;
        let count = object_transcoder::services::local_store::run_migrations(&store.db).await?;
        tracing::info!("Database migration complete ({} statements).", count);
        return Ok(());
    }

    let store = open_store(&cfg).await?;
    let transcoder = Transcoder::new(store, Arc::new(GzipCodec::default()))
        .with_digest(cfg.digest)
        .with_integrity_policy(cfg.integrity)
        .with_lease(cfg.lease.clone());

    match command {
        Command::Compress { path } => run_once(&cfg, &transcoder, Action::Compress, &path).await,
        Command::Decompress { path } => {
            run_once(&cfg, &transcoder, Action::Decompress, &path).await
        }
        Command::Metadata { path } => {
            let metadata = transcoder.metadata(&path).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(())
        }
        Command::Serve {
            host,
            port,
            workers,
        } => serve(&cfg, transcoder, ServeConfig::from_args(host, port, workers)?).await,
        Command::Migrate => Ok(()),
    }
}

async fn open_store(cfg: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match cfg.backend {
        Backend::Irods => Arc::new(IrodsStore::new(cfg.icommands_dir.clone())),
        Backend::Local => Arc::new(open_local_store(cfg).await?),
    };
    Ok(store)
}

async fn open_local_store(cfg: &AppConfig) -> Result<LocalStore> {
    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // Extract the local file path SQLx will use
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    LocalStore::open(&cfg.database_url, &cfg.storage_dir)
        .await
        .with_context(|| format!("opening catalog {}", cfg.database_url))
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping at the next state");
            token.cancel();
        }
    });
}

async fn run_once(
    cfg: &AppConfig,
    transcoder: &Transcoder,
    action: Action,
    path: &str,
) -> Result<()> {
    if !cfg.accepts(path) {
        bail!(
            "`{}` does not end with `{}`",
            path,
            cfg.required_extension.as_deref().unwrap_or_default()
        );
    }
    transcoder
        .store()
        .list(path)
        .await
        .with_context(|| format!("checking `{}`", path))?;
    transcoder
        .prepare_staging(&cfg.staging)
        .await
        .context("preparing staging locations")?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let outcome = transcoder
        .run(
            action,
            path,
            &cfg.staging,
            cfg.retention,
            &TracingObserver,
            &cancel,
        )
        .await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn serve(cfg: &AppConfig, transcoder: Transcoder, serve_cfg: ServeConfig) -> Result<()> {
    transcoder
        .prepare_staging(&cfg.staging)
        .await
        .context("preparing staging locations")?;

    let cancel = CancellationToken::new();
    let state = AppState::new(
        transcoder,
        cfg.staging.clone(),
        cfg.retention,
        serve_cfg.workers,
        cancel.clone(),
    )
    .with_required_extension(cfg.required_extension.clone());

    // --- Build router ---
    let app: Router = routes().with_state(state);

    // --- Start server ---
    let addr = serve_cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(serve_cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", serve_cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        "Server listening on http://{} with {} workers",
        listener.local_addr()?,
        serve_cfg.workers
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down, cancelling in-flight pipelines");
            }
            cancel.cancel();
        })
        .await?;

    Ok(())
}
