//! ituhouse API server binary.
//!
//! Provisions the database, runs migrations, seeds the super admin and serves
//! the REST API until interrupted.

use std::sync::Arc;

use clap::Parser;
use ituhouse_api::AppState;
use ituhouse_api::config::ApiConfig;
use ituhouse_core::auth::queries::PgAuthStore;
use ituhouse_core::bootstrap::ensure_superadmin;
use ituhouse_core::mail::{self, EmailSender, LogEmailSender, Mailer};
use tracing::{info, warn};

/// CLI arguments; each overrides the matching environment setting.
#[derive(Parser, Debug)]
#[command(name = "ituhouse_api_server", about = "ituhouse API server")]
struct Args {
    /// Port to listen on; overrides the port in `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,

    /// Skip creating the database when it does not exist.
    #[arg(long, default_value_t = false)]
    no_create_database: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,ituhouse_api=debug,ituhouse_core=debug")
                }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "127.0.0.1".into());
        config.bind_addr = format!("{host}:{port}");
    }

    info!(
        app = %config.app_name,
        environment = %config.environment,
        bind_addr = %config.bind_addr,
        "starting ituhouse_api_server"
    );

    if !args.no_create_database {
        ituhouse_core::db::ensure_database_exists(&config.database_url).await?;
    }

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = ituhouse_core::db::connect(&config.database_url, args.max_connections).await?;

    info!("running database migrations");
    ituhouse_api::migrate(&pool).await?;

    let store = Arc::new(PgAuthStore::new(pool));
    ensure_superadmin(store.as_ref(), &config.superadmin, config.bcrypt_cost).await?;

    let mut mailer = Mailer::from_configs(mail::load_sender_configs(&config.email_senders_file));
    if mailer.is_empty() && !config.is_production() {
        info!("no email channels configured; logging verification emails instead");
        mailer = Mailer::new(vec![Arc::new(LogEmailSender) as Arc<dyn EmailSender>]);
    }
    info!(channels = mailer.len(), "email delivery ready");

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(store, mailer, config);
    let app = ituhouse_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
