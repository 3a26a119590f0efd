use almoner::{rollback, settings, storage, web};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use sea_orm_migration::MigratorTrait;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "almoner",
    version,
    about = "Donation batch upload and rollback service"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Roll back a batch upload: delete its cases and contributions and
    /// return it to pending.
    Rollback {
        /// Batch upload id
        #[arg(long)]
        id: i64,
    },
    /// Roll back a batch upload stuck in processing after a crash. Only use
    /// this when no processing pass is actually running.
    ForceReset {
        /// Batch upload id
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database) and apply pending migrations
    let db = storage::init(&settings.database).await.into_diagnostic()?;
    migration::Migrator::up(&db, None).await.into_diagnostic()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            ensure_admin_donor(&db).await?;
            web::serve(settings, db).await?;
        }
        Command::Rollback { id } => {
            let batch = rollback::rollback(&db, id, false).await.into_diagnostic()?;
            tracing::info!(batch_id = batch.id, status = %batch.status, "Rollback finished");
        }
        Command::ForceReset { id } => {
            let batch = rollback::rollback(&db, id, true).await.into_diagnostic()?;
            tracing::info!(batch_id = batch.id, status = %batch.status, "Force reset finished");
        }
    }
    Ok(())
}

async fn ensure_admin_donor(db: &sea_orm::DatabaseConnection) -> Result<()> {
    if storage::get_donor_by_nickname(db, "admin")
        .await
        .into_diagnostic()?
        .is_none()
    {
        storage::create_donor(db, "admin", Some("Administrator".to_string()), true)
            .await
            .into_diagnostic()?;
        tracing::info!("Created default admin contributor (nickname: admin)");
    }
    Ok(())
}
