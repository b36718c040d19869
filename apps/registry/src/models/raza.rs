use super::{from_record, Record};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Breed with a summary of its species.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Raza {
    pub raza_id: i64,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_mod: Option<DateTime<Utc>>,
    pub usuario_creacion: Option<String>,
    pub usuario_mod: Option<String>,
    pub especie: EspecieRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EspecieRef {
    pub especie_id: i64,
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activo: Option<bool>,
}

#[derive(Deserialize)]
struct RazaRow {
    raza_id: i64,
    especie_id: i64,
    nombre: String,
    descripcion: Option<String>,
    activo: bool,
    fecha_creacion: DateTime<Utc>,
    fecha_mod: Option<DateTime<Utc>>,
    usuario_creacion: Option<String>,
    usuario_mod: Option<String>,
    #[serde(default)]
    especie_nombre: Option<String>,
    #[serde(default)]
    especie_activo: Option<bool>,
}

impl TryFrom<Record> for Raza {
    type Error = Error;

    fn try_from(record: Record) -> Result<Self> {
        let row: RazaRow = from_record(record)?;
        Ok(Raza {
            raza_id: row.raza_id,
            nombre: row.nombre,
            descripcion: row.descripcion,
            activo: row.activo,
            fecha_creacion: row.fecha_creacion,
            fecha_mod: row.fecha_mod,
            usuario_creacion: row.usuario_creacion,
            usuario_mod: row.usuario_mod,
            especie: EspecieRef {
                especie_id: row.especie_id,
                nombre: row.especie_nombre,
                activo: row.especie_activo,
            },
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct RazaCreate {
    pub especie_id: i64,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct RazaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub especie_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub descripcion: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RazaFilters {
    pub search: Option<String>,
    pub especie_id: Option<i64>,
    pub activo: Option<bool>,
}
