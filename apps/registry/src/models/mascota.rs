use super::{from_record, EspecieRef, Record};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sexo {
    M,
    H,
    #[default]
    F,
}

impl Sexo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sexo::M => "M",
            Sexo::H => "H",
            Sexo::F => "F",
        }
    }
}

/// Pet with summaries of its client, species and breed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mascota {
    pub mascota_id: i64,
    pub nombre: String,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub sexo: Option<Sexo>,
    pub chip: Option<String>,
    pub pelaje: Option<String>,
    pub descripcion: Option<String>,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_mod: Option<DateTime<Utc>>,
    pub usuario_creacion: Option<String>,
    pub usuario_mod: Option<String>,
    pub cliente: ClienteRef,
    pub especie: EspecieRef,
    pub raza: RazaRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClienteRef {
    pub cliente_id: i64,
    pub nombre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RazaRef {
    pub raza_id: i64,
    pub nombre: Option<String>,
}

/// Compact shape used when listing the pets of one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct MascotaSummary {
    pub mascota_id: i64,
    pub nombre: String,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub sexo: Option<Sexo>,
    pub chip: Option<String>,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
}

#[derive(Deserialize)]
struct MascotaRow {
    mascota_id: i64,
    cliente_id: i64,
    especie_id: i64,
    raza_id: i64,
    nombre: String,
    fecha_nacimiento: Option<NaiveDate>,
    sexo: Option<Sexo>,
    chip: Option<String>,
    pelaje: Option<String>,
    descripcion: Option<String>,
    activo: bool,
    fecha_creacion: DateTime<Utc>,
    fecha_mod: Option<DateTime<Utc>>,
    usuario_creacion: Option<String>,
    usuario_mod: Option<String>,
    #[serde(default)]
    cliente_nombre: Option<String>,
    #[serde(default)]
    especie_nombre: Option<String>,
    #[serde(default)]
    raza_nombre: Option<String>,
}

impl TryFrom<Record> for Mascota {
    type Error = Error;

    fn try_from(record: Record) -> Result<Self> {
        let row: MascotaRow = from_record(record)?;
        Ok(Mascota {
            mascota_id: row.mascota_id,
            nombre: row.nombre,
            fecha_nacimiento: row.fecha_nacimiento,
            sexo: row.sexo,
            chip: row.chip,
            pelaje: row.pelaje,
            descripcion: row.descripcion,
            activo: row.activo,
            fecha_creacion: row.fecha_creacion,
            fecha_mod: row.fecha_mod,
            usuario_creacion: row.usuario_creacion,
            usuario_mod: row.usuario_mod,
            cliente: ClienteRef {
                cliente_id: row.cliente_id,
                nombre: row.cliente_nombre,
            },
            especie: EspecieRef {
                especie_id: row.especie_id,
                nombre: row.especie_nombre,
                activo: None,
            },
            raza: RazaRef {
                raza_id: row.raza_id,
                nombre: row.raza_nombre,
            },
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct MascotaCreate {
    pub cliente_id: i64,
    pub especie_id: i64,
    pub raza_id: i64,
    pub nombre: String,
    #[serde(default)]
    pub fecha_nacimiento: Option<NaiveDate>,
    #[serde(default)]
    pub sexo: Option<Sexo>,
    #[serde(default)]
    pub chip: Option<String>,
    #[serde(default)]
    pub pelaje: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct MascotaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cliente_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub especie_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raza_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub fecha_nacimiento: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sexo: Option<Sexo>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub chip: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub pelaje: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub descripcion: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MascotaFilters {
    pub search: Option<String>,
    pub cliente_id: Option<i64>,
    pub especie_id: Option<i64>,
    pub raza_id: Option<i64>,
    pub sexo: Option<Sexo>,
    pub chip: Option<String>,
    pub fecha_nacimiento_desde: Option<NaiveDate>,
    pub fecha_nacimiento_hasta: Option<NaiveDate>,
    pub activo: Option<bool>,
}
