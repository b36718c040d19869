//! Domain models: entity kinds, typed entities and list envelopes.

mod cliente;
mod especie;
mod list;
mod mascota;
mod raza;

pub use cliente::{Cliente, ClienteCreate, ClienteFilters, ClienteUpdate};
pub use especie::{Especie, EspecieCreate, EspecieFilters, EspecieUpdate};
pub use list::{
    DeleteOutcome, ListRequest, Page, PaginationMeta, PaginationParams, SortDirection, SortParams,
};
pub use mascota::{
    ClienteRef, Mascota, MascotaCreate, MascotaFilters, MascotaSummary, MascotaUpdate, RazaRef,
    Sexo,
};
pub use raza::{EspecieRef, Raza, RazaCreate, RazaFilters, RazaUpdate};

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// A row as exchanged with the record store: column name to JSON value.
pub type Record = serde_json::Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Especie,
    Raza,
    Cliente,
    Mascota,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Especie,
        EntityKind::Raza,
        EntityKind::Cliente,
        EntityKind::Mascota,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Especie => "especie",
            EntityKind::Raza => "raza",
            EntityKind::Cliente => "cliente",
            EntityKind::Mascota => "mascota",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::BadRequest(format!("Entidad desconocida: {}", s)))
    }
}

/// Deserialize a typed model from a store record.
pub(crate) fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    serde_json::from_value(JsonValue::Object(record))
        .map_err(|e| Error::Internal(format!("Malformed record: {}", e)))
}

/// Serialize an input payload into store columns.
pub(crate) fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(other) => Err(Error::Internal(format!(
            "Expected an object payload, got {}",
            other
        ))),
        Err(e) => Err(Error::Internal(format!("Failed to encode payload: {}", e))),
    }
}

/// Distinguishes an explicit `null` (clear the column) from an absent field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
