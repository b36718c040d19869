//! Shared application state

use crate::{
    config::{Config, DatabaseConfig},
    db::{PostgresRecordStore, RecordStore},
    models::EntityKind,
    services::{
        ClienteService, DescriptorSet, EspecieService, LifecycleGovernor, MascotaService,
        QueryComposer, RazaService,
    },
    Error, Result,
};
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Services wired over one record store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
    pub descriptors: Arc<DescriptorSet>,
    pub governor: Arc<LifecycleGovernor>,
    pub composer: Arc<QueryComposer>,
    pub especies: Arc<EspecieService>,
    pub razas: Arc<RazaService>,
    pub clientes: Arc<ClienteService>,
    pub mascotas: Arc<MascotaService>,
}

/// Presence of one declared dependent table in the live schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentTableStatus {
    pub entity: EntityKind,
    pub table: &'static str,
    pub exists: bool,
    pub has_active_flag: bool,
}

impl AppState {
    /// Connect to PostgreSQL, apply migrations if configured, and wire the services.
    pub async fn new(config: Config) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let pool = create_db_pool(&config.database).await?;
        if config.database.run_migrations {
            run_migrations(&pool).await?;
        }

        let state = Self::with_store(config, Arc::new(PostgresRecordStore::new(pool)))?;

        for status in state.schema_report().await? {
            if !status.exists {
                tracing::warn!(
                    entity = %status.entity,
                    table = status.table,
                    "Declared dependent table is missing; scans will skip it"
                );
            }
        }

        tracing::info!("Application state initialized");
        Ok(state)
    }

    /// Wire the services over an existing store.
    pub fn with_store(config: Config, store: Arc<dyn RecordStore>) -> Result<Self> {
        let descriptors = DescriptorSet::registry();
        descriptors
            .validate()
            .map_err(|problems| Error::Config(problems.join("; ")))?;
        let descriptors = Arc::new(descriptors);

        let governor = Arc::new(LifecycleGovernor::new(
            store.clone(),
            descriptors.clone(),
            config.registry.default_actor.clone(),
        ));
        let composer = Arc::new(QueryComposer::new(
            store.clone(),
            descriptors.clone(),
            &config.registry,
        ));

        Ok(Self {
            especies: Arc::new(EspecieService::new(governor.clone(), composer.clone())),
            razas: Arc::new(RazaService::new(governor.clone(), composer.clone())),
            clientes: Arc::new(ClienteService::new(governor.clone(), composer.clone())),
            mascotas: Arc::new(MascotaService::new(governor.clone(), composer.clone())),
            config: Arc::new(config),
            store,
            descriptors,
            governor,
            composer,
        })
    }

    /// Check the store for every dependent table the descriptors declare.
    pub async fn schema_report(&self) -> Result<Vec<DependentTableStatus>> {
        let mut seen = BTreeSet::new();
        let mut report = Vec::new();

        for d in self.descriptors.iter() {
            let tables = d
                .delete_dependents
                .tables
                .iter()
                .chain(&d.deactivate_dependents.tables);
            for dependent in tables {
                if !seen.insert((d.kind.as_str(), dependent.table)) {
                    continue;
                }
                let exists = self.store.table_exists(dependent.table).await?;
                let has_active_flag = exists
                    && self.store.column_exists(dependent.table, "activo").await?;
                report.push(DependentTableStatus {
                    entity: d.kind,
                    table: dependent.table,
                    exists,
                    has_active_flag,
                });
            }
        }
        Ok(report)
    }
}

/// Build the PostgreSQL pool with per-connection statement and lock timeouts.
pub async fn create_db_pool(config: &DatabaseConfig) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.statement_timeout_seconds;
    let lock_timeout = config.lock_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.pool_min_size)
        .max_connections(config.pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(config.pool_timeout_seconds))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;
                sqlx::query(&format!("SET lock_timeout = '{}s'", lock_timeout))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
        .map_err(Error::Database)?;

    tracing::info!(
        min = config.pool_min_size,
        max = config.pool_max_size,
        "Database pool created"
    );
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))
}
