use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Cliente {
    pub cliente_id: i64,
    pub nombre: String,
    pub cedula: Option<String>,
    pub ruc: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub ubicacion_gps: Option<String>,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_mod: Option<DateTime<Utc>>,
    pub usuario_creacion: Option<String>,
    pub usuario_mod: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct ClienteCreate {
    pub nombre: String,
    #[serde(default)]
    pub cedula: Option<String>,
    #[serde(default)]
    pub ruc: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub fecha_nacimiento: Option<NaiveDate>,
    #[serde(default)]
    pub ubicacion_gps: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct ClienteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub cedula: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub ruc: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub telefono: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub direccion: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub fecha_nacimiento: Option<Option<NaiveDate>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::nullable"
    )]
    pub ubicacion_gps: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClienteFilters {
    pub search: Option<String>,
    pub cedula: Option<String>,
    pub ruc: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub fecha_nacimiento_desde: Option<NaiveDate>,
    pub fecha_nacimiento_hasta: Option<NaiveDate>,
    pub activo: Option<bool>,
}
