use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use docgate_core::{Identity, PermissionSet, RequestContext};
use docgate_server::bootstrap;
use docgate_server::cli::{Cli, Command};
use docgate_server::config::{ADMIN_POLICY, AppConfig, LogFormat, StorageBackend};
use docgate_server::envelope::Operation;
use docgate_server::metrics::Metrics;
use docgate_server::operations::CreateAccount;
use docgate_server::rest;
use docgate_storage::postgres::migrations;
use docgate_storage::{Backend, InMemoryBackend, PostgresBackend};

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Some(Command::Migrate) => run_migrate(&config).await,
        Some(Command::CreateUser {
            user_id,
            policy,
            name,
            department,
            read,
            write,
        }) => {
            let body = json!({
                "user_id": user_id,
                "policy": policy,
                "name": name,
                "department": department,
                "read": read,
                "write": write,
            });
            run_create_user(&config, body).await
        }
        Some(Command::Serve) | None => run_serve(config).await,
    }
}

async fn connect(config: &AppConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("running database migrations");
    connect(config).await?;
    tracing::info!("migrations completed successfully");
    Ok(())
}

async fn run_create_user(
    config: &AppConfig,
    body: serde_json::Value,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = PostgresBackend::new(connect(config).await?);

    let operator = Identity::new("cli", ADMIN_POLICY, PermissionSet::full())
        .with_user_management(true);
    let mut ctx = RequestContext::new(operator);
    let created = CreateAccount {
        body: Ok(body),
        policies: config.accounts.policies.iter().cloned().collect(),
    }
    .execute(&mut ctx, &backend)
    .await?;

    println!("User created successfully");
    println!("  User ID: {}", created.user_id);
    println!("  API Key: {}", created.api_key);
    println!();
    println!("Store this key securely; it will not be shown again.");
    Ok(())
}

async fn run_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; accounts and audit records are not persisted");
            serve(config, Arc::new(InMemoryBackend::new())).await
        }
        StorageBackend::Postgres => {
            let pool = connect(&config).await?;
            serve(config, Arc::new(PostgresBackend::new(pool))).await
        }
    }
}

async fn serve<B: Backend>(
    config: AppConfig,
    backend: Arc<B>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(admin) = &config.accounts.bootstrap_admin
        && bootstrap::ensure_admin(backend.as_ref(), admin).await?
    {
        tracing::info!(user_id = %admin.user_id, "bootstrap admin account created");
    }

    let metrics = Arc::new(Metrics::new());
    let state = rest::AppState::new(backend, &config, metrics);
    let router = rest::create_router(state);

    let addr: std::net::SocketAddr = config.http_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, token_path = %config.auth.token_path, "docgate listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => { tracing::info!("received SIGINT"); }
                _ = sigterm.recv() => { tracing::info!("received SIGTERM"); }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler, using SIGINT only");
            let _ = ctrl_c.await;
            tracing::info!("received SIGINT");
        }
    }
}
