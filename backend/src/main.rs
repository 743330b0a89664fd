//! Asset Keeper server and maintenance CLI.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use asset_keeper_backend::api::{routes::create_router, AppState};
use asset_keeper_backend::config::{Config, StoreBackend};
use asset_keeper_backend::models::user::CreateUserRequest;
use asset_keeper_backend::services::encryption::SecretBox;
use asset_keeper_backend::services::metrics_service;
use asset_keeper_backend::services::notification_service::{LogNotifier, Notifier, SmtpNotifier};
use asset_keeper_backend::services::scheduler_service;
use asset_keeper_backend::store::memory::MemoryStore;
use asset_keeper_backend::store::postgres::PgStore;
use asset_keeper_backend::store::Store;

#[derive(Debug, Parser)]
#[command(name = "asset-keeper", version, about = "IT asset inventory server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Apply database migrations and exit.
    Migrate,
    /// Run one cron task once, e.g. from an external scheduler.
    Cron {
        /// Task name, e.g. `passwordexpiration`.
        name: String,
    },
    /// Create a local user with the administrator profile.
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,asset_keeper_backend=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .connect(url)
                .await
                .context("Failed to connect to database")?;
            let store = PgStore::new(pool);
            store.migrate().await?;
            tracing::info!("Connected to PostgreSQL, migrations applied");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn secret_box(config: &Config) -> anyhow::Result<SecretBox> {
    match &config.config_encryption_key {
        Some(key) => Ok(SecretBox::from_base64(key)?),
        None => {
            tracing::warn!("CONFIG_ENCRYPTION_KEY not set, secured settings use a throwaway key");
            Ok(SecretBox::generate())
        }
    }
}

fn notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!("Delivering notifications through {}:{}", smtp.host, smtp.port);
            Ok(Arc::new(SmtpNotifier::new(smtp)?))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_json);

    if let Some(Command::Migrate) = cli.command {
        anyhow::ensure!(
            config.store_backend == StoreBackend::Postgres,
            "migrate requires STORE_BACKEND=postgres"
        );
        open_store(&config).await?;
        return Ok(());
    }

    let store = open_store(&config).await?;
    let metrics_handle = match metrics_service::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Prometheus recorder unavailable: {}", e);
            None
        }
    };
    let state = Arc::new(AppState::new(
        config.clone(),
        store.clone(),
        secret_box(&config)?,
        notifier(&config)?,
        metrics_handle,
    ));

    let registered = state.cron.register_builtin().await?;
    if registered > 0 {
        tracing::info!("Registered {} built-in cron task(s)", registered);
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Cron { name } => {
            let run = state.cron.run_task(&name).await?;
            tracing::info!(
                "Task {} finished with status {} (volume {})",
                run.task,
                run.status.as_str(),
                run.volume
            );
            Ok(())
        }
        Command::CreateAdmin { name, password } => {
            let user = state
                .users
                .create(CreateUserRequest {
                    name,
                    password: Some(password.clone()),
                    password2: Some(password),
                    profiles_id: Some(config.admin_profile_id),
                    ..Default::default()
                })
                .await?;
            tracing::info!("Created administrator '{}' (id {})", user.name, user.id);
            Ok(())
        }
        Command::Serve | Command::Migrate => {
            if config.scheduler_enabled {
                scheduler_service::spawn_all(store, state.cron.clone(), &config);
            }

            let app = create_router(state);
            let address = config.bind_address();
            let listener = TcpListener::bind(&address)
                .await
                .with_context(|| format!("Failed to bind {}", address))?;
            tracing::info!("Asset Keeper listening on {}", address);
            axum::serve(listener, app).await?;
            Ok(())
        }
    }
}
