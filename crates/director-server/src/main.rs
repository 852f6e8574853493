use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use director_auth::auth::cleanup::cleanup_expired_tokens;
use director_auth::auth::service::RegisterInput;
use director_auth::auth::{AuthService, ClientInfo, LogNotifier};
use director_auth::migrations::Migrator;
use director_auth::models::user::Role;
use director_auth::openapi::ApiDoc;
use director_auth::{App, Config, LogFormat};
use sea_orm_migration::MigratorTrait;
use utoipa::OpenApi;

#[derive(Parser)]
#[command(name = "director-server")]
#[command(about = "Director of One authentication API server")]
#[command(version)]
struct Cli {
    /// Log output format: compact, pretty or json
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending migrations and start the server (default)
    Serve,
    /// Run pending migrations
    Migrate,
    /// Roll back applied migrations
    Rollback {
        /// Number of migrations to roll back
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Delete expired refresh tokens, sessions and reset tokens once
    Cleanup,
    /// Print the OpenAPI document as JSON
    Docs,
    /// Create a verified admin account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// Read from ADMIN_PASSWORD when not given
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change the role of an existing account
    Promote {
        /// Email or username
        identifier: String,
        /// user, manager or admin
        #[arg(long, default_value = "admin")]
        role: Role,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Docs) = cli.command {
        println!("{}", serde_json::to_string_pretty(&ApiDoc::openapi())?);
        return Ok(());
    }

    director_auth::init_logging_with_format(cli.log_format);
    let config = Config::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let app = App::with_config(config)
                .await
                .map_err(|e| anyhow::anyhow!("startup failed: {e}"))?;
            app.run()
                .await
                .map_err(|e| anyhow::anyhow!("server error: {e}"))?;
        }
        Commands::Migrate => {
            let db = director_auth::db::connect(&config).await?;
            tracing::info!("Running pending database migrations...");
            Migrator::up(&db, None).await?;
            tracing::info!("Migrations complete.");
        }
        Commands::Rollback { steps } => {
            let db = director_auth::db::connect(&config).await?;
            tracing::info!("Rolling back {} migration(s)...", steps);
            Migrator::down(&db, Some(steps)).await?;
            tracing::info!("Rollback complete.");
        }
        Commands::Cleanup => {
            let db = director_auth::db::connect(&config).await?;
            let report = cleanup_expired_tokens(&db).await?;
            tracing::info!(
                refresh_tokens = report.refresh_tokens,
                sessions = report.sessions,
                reset_tokens = report.reset_tokens,
                "cleanup complete"
            );
        }
        Commands::CreateAdmin {
            email,
            username,
            password,
        } => {
            let auth = account_service(config).await?;
            let user = auth
                .create_admin(
                    RegisterInput {
                        email,
                        username,
                        password,
                        first_name: None,
                        last_name: None,
                    },
                    &cli_client(),
                )
                .await
                .map_err(|e| anyhow::anyhow!("could not create admin: {e}"))?;
            tracing::info!(user_id = user.id, email = %user.email, "admin created");
        }
        Commands::Promote { identifier, role } => {
            let auth = account_service(config).await?;
            let user = auth
                .set_role_by_identifier(&identifier, role, &cli_client())
                .await
                .map_err(|e| anyhow::anyhow!("could not change role: {e}"))?;
            tracing::info!(user_id = user.id, role = %role, "role updated");
        }
        Commands::Docs => {}
    }

    Ok(())
}

/// Migrated database plus an account service that logs instead of mailing.
async fn account_service(config: Config) -> anyhow::Result<AuthService> {
    let db = director_auth::db::connect(&config).await?;
    Migrator::up(&db, None).await?;
    Ok(AuthService::new(
        db,
        Arc::new(config),
        Arc::new(LogNotifier::new(false)),
    ))
}

fn cli_client() -> ClientInfo {
    ClientInfo {
        ip_address: None,
        user_agent: Some(format!("director-server/{}", env!("CARGO_PKG_VERSION"))),
    }
}
