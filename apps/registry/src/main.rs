//! Registry administration CLI.
//!
//! Applies migrations, reports how the live schema matches the declared dependent tables,
//! and runs list queries against the registry.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use vet_registry::{
    config::Config,
    logging,
    models::{
        ClienteFilters, EntityKind, EspecieFilters, ListRequest, MascotaFilters, RazaFilters,
        SortDirection,
    },
    state::{self, AppState},
};

#[derive(Parser)]
#[command(
    name = "registry-admin",
    about = "Administrative commands for the veterinary registry",
    version,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the embedded database migrations.
    Migrate,

    /// Validate descriptors and report which dependent tables exist in the live schema.
    Check,

    /// List one entity kind as JSON.
    List {
        /// especie, raza, cliente or mascota.
        entity: EntityKind,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        limit: Option<i64>,
        /// Case-insensitive substring search.
        #[arg(long)]
        search: Option<String>,
        /// List inactive rows instead of active ones.
        #[arg(long, action = ArgAction::SetTrue)]
        inactive: bool,
        /// Sort field; unknown fields sort by name.
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        desc: bool,
    },
}

struct ListArgs {
    page: i64,
    limit: Option<i64>,
    sort: Option<String>,
    desc: bool,
}

impl ListArgs {
    fn request<F: Default>(&self, filters: F) -> ListRequest<F> {
        let mut request = ListRequest::with_filters(filters);
        request.pagination.page = Some(self.page);
        request.pagination.limit = self.limit;
        if let Some(field) = &self.sort {
            let direction = if self.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            request = request.sorted_by(field.clone(), direction);
        }
        request
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let _log_guard = logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting registry-admin");

    match cli.command {
        Commands::Migrate => {
            let pool = state::create_db_pool(&config.database)
                .await
                .context("Failed to connect to database")?;
            state::run_migrations(&pool)
                .await
                .context("Failed to apply migrations")?;
            println!("Migrations applied");
        }
        Commands::Check => {
            config.database.run_migrations = false;
            let state = AppState::new(config)
                .await
                .context("Failed to initialize application state")?;
            for status in state.schema_report().await.context("Schema check failed")? {
                println!(
                    "{:<10} {:<18} {:<8} {}",
                    status.entity,
                    status.table,
                    if status.exists { "present" } else { "missing" },
                    if status.has_active_flag { "activo" } else { "-" }
                );
            }
        }
        Commands::List {
            entity,
            page,
            limit,
            search,
            inactive,
            sort,
            desc,
        } => {
            config.database.run_migrations = false;
            let state = AppState::new(config)
                .await
                .context("Failed to initialize application state")?;
            let args = ListArgs {
                page,
                limit,
                sort,
                desc,
            };
            let activo = inactive.then_some(false);

            match entity {
                EntityKind::Especie => {
                    let request = args.request(EspecieFilters { search, activo });
                    print_json(&state.especies.list(&request).await?)?;
                }
                EntityKind::Raza => {
                    let request = args.request(RazaFilters {
                        search,
                        activo,
                        ..Default::default()
                    });
                    print_json(&state.razas.list(&request).await?)?;
                }
                EntityKind::Cliente => {
                    let request = args.request(ClienteFilters {
                        search,
                        activo,
                        ..Default::default()
                    });
                    print_json(&state.clientes.list(&request).await?)?;
                }
                EntityKind::Mascota => {
                    let request = args.request(MascotaFilters {
                        search,
                        activo,
                        ..Default::default()
                    });
                    print_json(&state.mascotas.list(&request).await?)?;
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{out}");
    Ok(())
}
