//! Shared fixtures for integration tests.
//!
//! Every test app runs over the in-memory store wrapped in [`FaultyStore`], which can be
//! switched into failure modes mid-test to exercise storage races and fail-open paths.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use vet_registry::{
    config::Config,
    db::query::{PageQuery, ScopeField, TableRef},
    db::{MemoryRecordStore, RecordStore, TableDef},
    models::{
        Cliente, ClienteCreate, Especie, EspecieCreate, Mascota, MascotaCreate, Raza, RazaCreate,
        Record,
    },
    state::AppState,
    Error, ErrorKind, Result,
};

/// Failure modes for [`FaultyStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Uniqueness lookups find nothing, so duplicates reach the storage constraints.
    pub blind_scope_lookups: bool,
    /// Existence checks report no rows, so deletes reach the storage foreign keys.
    pub blind_exists: bool,
    /// Schema lookups fail.
    pub failing_schema_lookups: bool,
    /// Primary-key reads fail.
    pub failing_reads: bool,
}

pub struct FaultyStore {
    inner: Arc<MemoryRecordStore>,
    faults: Mutex<Faults>,
}

impl FaultyStore {
    fn faults(&self) -> Faults {
        *self.faults.lock().unwrap()
    }
}

fn outage() -> Error {
    Error::Internal("connection reset by peer".to_string())
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn find_by_id(&self, table: &TableRef, id: i64) -> Result<Option<Record>> {
        if self.faults().failing_reads {
            return Err(outage());
        }
        self.inner.find_by_id(table, id).await
    }

    async fn find_by_scope(
        &self,
        table: &TableRef,
        scope: &[ScopeField],
        exclude_id: Option<i64>,
    ) -> Result<Option<Record>> {
        if self.faults().blind_scope_lookups {
            return Ok(None);
        }
        self.inner.find_by_scope(table, scope, exclude_id).await
    }

    async fn exists_filtered(
        &self,
        table: &str,
        fk_column: &str,
        id: i64,
        active_column: Option<&str>,
    ) -> Result<bool> {
        if self.faults().blind_exists {
            return Ok(false);
        }
        self.inner
            .exists_filtered(table, fk_column, id, active_column)
            .await
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        if self.faults().failing_schema_lookups {
            return Err(outage());
        }
        self.inner.table_exists(table).await
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        if self.faults().failing_schema_lookups {
            return Err(outage());
        }
        self.inner.column_exists(table, column).await
    }

    async fn insert(&self, table: &TableRef, values: Record) -> Result<Record> {
        self.inner.insert(table, values).await
    }

    async fn update_fields(&self, table: &TableRef, id: i64, values: Record) -> Result<()> {
        self.inner.update_fields(table, id, values).await
    }

    async fn delete(&self, table: &TableRef, id: i64) -> Result<()> {
        self.inner.delete(table, id).await
    }

    async fn query_page(&self, table: &TableRef, query: &PageQuery) -> Result<(Vec<Record>, i64)> {
        self.inner.query_page(table, query).await
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryRecordStore>,
    faulty: Arc<FaultyStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config::default();
        configure(&mut config);

        let store = Arc::new(MemoryRecordStore::registry());
        let faulty = Arc::new(FaultyStore {
            inner: store.clone(),
            faults: Mutex::new(Faults::default()),
        });
        let state = AppState::with_store(config, faulty.clone()).expect("descriptors are valid");
        Self {
            state,
            store,
            faulty,
        }
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faulty.faults.lock().unwrap() = faults;
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.store.row_count(table).unwrap()
    }

    /// Register a dependent table whose `fk_column` references `parent`.
    pub fn add_dependent_table(&self, table: &str, fk_column: &str, parent: &str, with_activo: bool) {
        let mut def = TableDef::new(table, &format!("{table}_id")).foreign_key(fk_column, parent);
        if with_activo {
            def = def.columns(&["activo"]);
        }
        self.store.add_table(def).unwrap();
    }

    pub async fn insert_row(&self, table: &str, row: Value) -> anyhow::Result<Record> {
        let table = TableRef::new(table, format!("{table}_id"));
        let values = row.as_object().cloned().unwrap_or_default();
        Ok(self.store.insert(&table, values).await?)
    }

    /// Write columns directly, bypassing the governor.
    pub async fn force_update(&self, table: &str, id: i64, row: Value) -> anyhow::Result<()> {
        let table = TableRef::new(table, format!("{table}_id"));
        let values = row.as_object().cloned().unwrap_or_default();
        Ok(self.store.update_fields(&table, id, values).await?)
    }

    pub async fn especie(&self, nombre: &str) -> anyhow::Result<Especie> {
        let input = EspecieCreate {
            nombre: nombre.to_string(),
            descripcion: None,
        };
        Ok(self.state.especies.create(input, None).await?)
    }

    pub async fn raza(&self, especie_id: i64, nombre: &str) -> anyhow::Result<Raza> {
        let input = RazaCreate {
            especie_id,
            nombre: nombre.to_string(),
            descripcion: None,
        };
        Ok(self.state.razas.create(input, None).await?)
    }

    pub async fn cliente(&self, nombre: &str, cedula: &str) -> anyhow::Result<Cliente> {
        let input = ClienteCreate {
            nombre: nombre.to_string(),
            cedula: Some(cedula.to_string()),
            ..Default::default()
        };
        Ok(self.state.clientes.create(input, None).await?)
    }

    pub async fn mascota(
        &self,
        cliente_id: i64,
        especie_id: i64,
        raza_id: i64,
        nombre: &str,
    ) -> anyhow::Result<Mascota> {
        let input = MascotaCreate {
            cliente_id,
            especie_id,
            raza_id,
            nombre: nombre.to_string(),
            ..Default::default()
        };
        Ok(self.state.mascotas.create(input, None).await?)
    }
}

/// A client, species, breed and pet wired together.
pub struct Household {
    pub cliente: Cliente,
    pub especie: Especie,
    pub raza: Raza,
    pub mascota: Mascota,
}

pub async fn household(app: &TestApp) -> anyhow::Result<Household> {
    let cliente = app.cliente("Ana Torres", "0912345678").await?;
    let especie = app.especie("Canino").await?;
    let raza = app.raza(especie.especie_id, "Labrador").await?;
    let mascota = app
        .mascota(cliente.cliente_id, especie.especie_id, raza.raza_id, "Max")
        .await?;
    Ok(Household {
        cliente,
        especie,
        raza,
        mascota,
    })
}

/// Assert an operation failed with the given kind and exact message.
pub fn assert_error<T: Debug>(result: Result<T>, kind: ErrorKind, message: &str) {
    match result {
        Ok(value) => panic!("expected {kind:?} '{message}', got Ok({value:?})"),
        Err(err) => {
            assert_eq!(err.kind(), kind, "unexpected error: {err}");
            assert_eq!(err.to_string(), message);
        }
    }
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}
