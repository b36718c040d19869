//! Entity descriptors.
//!
//! One descriptor per entity kind declares everything the lifecycle governor and query
//! composer need: the table, normalized text fields, unique scopes, parent references,
//! owned collections, dependent tables and list options. The set is validated once at
//! startup.

use crate::db::query::{is_plain_identifier, ColumnRef, TableRef};
use crate::models::EntityKind;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A text column trimmed before comparison and storage.
#[derive(Debug, Clone)]
pub struct TextField {
    pub column: &'static str,
    /// BadRequest message when the value is empty after trimming. Optional fields store NULL.
    pub required: Option<&'static str>,
    /// Enforce `required` on create only; updates may clear the column.
    pub create_only: bool,
}

impl TextField {
    /// Message to raise for an empty value, if the field is required on this path.
    pub(crate) fn required_message(&self, creating: bool) -> Option<&'static str> {
        if self.create_only && !creating {
            return None;
        }
        self.required
    }
}

#[derive(Debug, Clone)]
pub struct UniqueScope {
    pub column: &'static str,
    /// Compare with trim + case folding.
    pub normalized: bool,
    /// Exact-match column the uniqueness is scoped to.
    pub scoped_by: Option<&'static str>,
    pub create_message: &'static str,
    pub update_message: &'static str,
}

#[derive(Debug, Clone)]
pub struct ParentRef {
    pub kind: EntityKind,
    pub fk_column: &'static str,
    /// `(parent column, output key)` copied into hydrated records and list rows.
    pub summary: Vec<(&'static str, &'static str)>,
    pub inactive_on_create: &'static str,
    pub inactive_on_update: &'static str,
    pub inactive_on_deactivate: Option<&'static str>,
    pub inactive_on_reactivate: Option<&'static str>,
    /// NotFound message when the storage engine reports a dangling reference.
    pub missing_on_write: &'static str,
}

/// `self.local_column` must equal `parent(via).parent_column`.
#[derive(Debug, Clone)]
pub struct ConsistencyRule {
    pub via: EntityKind,
    pub parent_column: &'static str,
    pub local_column: &'static str,
    pub message: &'static str,
}

/// A modeled one-to-many that must be empty before a hard delete.
#[derive(Debug, Clone)]
pub struct OwnedCollection {
    pub table: &'static str,
    pub fk_column: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentTable {
    pub table: &'static str,
    pub fk_column: &'static str,
    pub active_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DependentCheck {
    pub tables: Vec<DependentTable>,
    pub message: &'static str,
}

impl DependentCheck {
    fn any(fk_column: &'static str, tables: &[&'static str], message: &'static str) -> Self {
        Self {
            tables: tables
                .iter()
                .map(|&table| DependentTable {
                    table,
                    fk_column,
                    active_only: false,
                })
                .collect(),
            message,
        }
    }

    fn active(fk_column: &'static str, tables: &[&'static str], message: &'static str) -> Self {
        let mut check = Self::any(fk_column, tables, message);
        for table in &mut check.tables {
            table.active_only = true;
        }
        check
    }
}

/// Message templates; `{id}` is replaced with the entity id.
#[derive(Debug, Clone)]
pub struct Messages {
    pub not_found: &'static str,
    pub already_inactive: &'static str,
    pub already_active: &'static str,
    pub deleted: &'static str,
    pub delete_blocked_by_storage: &'static str,
}

pub(crate) fn render(template: &str, id: i64) -> String {
    template.replace("{id}", &id.to_string())
}

#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub table: TableRef,
    /// Singular noun used in error contexts, e.g. `especie`.
    pub label: &'static str,
    pub plural: &'static str,
    pub name_column: &'static str,
    pub text_fields: Vec<TextField>,
    /// Values applied on create when the input omits the column or sends null.
    pub defaults: Vec<(&'static str, JsonValue)>,
    pub unique_scopes: Vec<UniqueScope>,
    pub parents: Vec<ParentRef>,
    pub consistency: Vec<ConsistencyRule>,
    pub owned_collections: Vec<OwnedCollection>,
    pub delete_dependents: DependentCheck,
    pub deactivate_dependents: DependentCheck,
    pub deactivate_checks_parents: bool,
    pub search_columns: Vec<ColumnRef>,
    /// Accepted sort keys mapped to their column.
    pub sortable: Vec<(&'static str, ColumnRef)>,
    pub messages: Messages,
}

impl EntityDescriptor {
    pub fn parent(&self, kind: EntityKind) -> Option<&ParentRef> {
        self.parents.iter().find(|p| p.kind == kind)
    }

    /// Resolve a requested sort key. Matching ignores case and underscores, so
    /// `fechaCreacion` and `fecha_creacion` are the same key.
    pub fn sort_column(&self, field: &str) -> Option<&ColumnRef> {
        let wanted = fold_key(field);
        self.sortable
            .iter()
            .find(|(key, _)| fold_key(key) == wanted)
            .map(|(_, column)| column)
    }

    /// `Error al {verb} {label}`
    pub(crate) fn context(&self, verb: &str) -> String {
        format!("Error al {} {}", verb, self.label)
    }
}

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Descriptors for every entity kind.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    descriptors: HashMap<EntityKind, EntityDescriptor>,
}

impl DescriptorSet {
    pub fn new(descriptors: impl IntoIterator<Item = EntityDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().map(|d| (d.kind, d)).collect(),
        }
    }

    pub fn registry() -> Self {
        Self::new([especie(), raza(), cliente(), mascota()])
    }

    pub fn get(&self, kind: EntityKind) -> Option<&EntityDescriptor> {
        self.descriptors.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDescriptor> {
        EntityKind::ALL
            .into_iter()
            .filter_map(|k| self.descriptors.get(&k))
    }

    /// Check internal consistency. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        for d in self.iter() {
            let entity = d.kind.as_str();
            let mut idents: Vec<&str> = vec![
                d.table.name.as_str(),
                d.table.id_column.as_str(),
                d.name_column,
            ];
            idents.extend(d.text_fields.iter().map(|f| f.column));
            idents.extend(d.defaults.iter().map(|(c, _)| *c));
            idents.extend(d.unique_scopes.iter().flat_map(|u| {
                std::iter::once(u.column).chain(u.scoped_by)
            }));
            idents.extend(d.owned_collections.iter().flat_map(|o| [o.table, o.fk_column]));
            idents.extend(
                d.delete_dependents
                    .tables
                    .iter()
                    .chain(&d.deactivate_dependents.tables)
                    .flat_map(|t| [t.table, t.fk_column]),
            );
            for ident in idents {
                if !is_plain_identifier(ident) {
                    problems.push(format!("{}: invalid identifier '{}'", entity, ident));
                }
            }

            for parent in &d.parents {
                if !is_plain_identifier(parent.fk_column) {
                    problems.push(format!(
                        "{}: invalid identifier '{}'",
                        entity, parent.fk_column
                    ));
                }
                if self.get(parent.kind).is_none() {
                    problems.push(format!(
                        "{}: parent '{}' is not registered",
                        entity, parent.kind
                    ));
                }
                if parent.kind == d.kind {
                    problems.push(format!("{}: entity cannot be its own parent", entity));
                }
            }

            let columns = d
                .search_columns
                .iter()
                .chain(d.sortable.iter().map(|(_, c)| c));
            for column in columns {
                match &column.alias {
                    None => {}
                    Some(alias) => {
                        let declared = d.parents.iter().any(|p| p.kind.as_str() == alias);
                        if !declared {
                            problems.push(format!(
                                "{}: column '{}.{}' refers to an undeclared parent",
                                entity, alias, column.column
                            ));
                        }
                    }
                }
                if !is_plain_identifier(&column.column) {
                    problems.push(format!(
                        "{}: invalid identifier '{}'",
                        entity, column.column
                    ));
                }
            }

            if d.sort_column(d.name_column).is_none() {
                problems.push(format!(
                    "{}: name column '{}' must be sortable",
                    entity, d.name_column
                ));
            }

            for rule in &d.consistency {
                if d.parent(rule.via).is_none() {
                    problems.push(format!(
                        "{}: consistency rule goes through undeclared parent '{}'",
                        entity, rule.via
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

fn audit_sorts(mut sorts: Vec<(&'static str, ColumnRef)>) -> Vec<(&'static str, ColumnRef)> {
    sorts.push(("fecha_creacion", ColumnRef::base("fecha_creacion")));
    sorts
}

fn especie() -> EntityDescriptor {
    EntityDescriptor {
        kind: EntityKind::Especie,
        table: TableRef::new("especie", "especie_id"),
        label: "especie",
        plural: "especies",
        name_column: "nombre",
        text_fields: vec![TextField {
            column: "nombre",
            required: Some("El nombre de la especie no puede estar vacío"),
            create_only: false,
        }],
        defaults: Vec::new(),
        unique_scopes: vec![UniqueScope {
            column: "nombre",
            normalized: true,
            scoped_by: None,
            create_message: "Ya existe una especie con este nombre",
            update_message: "Ya existe otra especie con este nombre",
        }],
        parents: Vec::new(),
        consistency: Vec::new(),
        owned_collections: vec![OwnedCollection {
            table: "raza",
            fk_column: "especie_id",
            message: "No se puede eliminar la especie porque tiene razas asociadas",
        }],
        delete_dependents: DependentCheck::any(
            "especie_id",
            &["mascota"],
            "No se puede eliminar la especie porque tiene mascotas asociadas",
        ),
        deactivate_dependents: DependentCheck::active(
            "especie_id",
            &["mascota"],
            "No se puede inactivar la especie porque tiene mascotas activas asociadas",
        ),
        deactivate_checks_parents: false,
        search_columns: vec![ColumnRef::base("nombre"), ColumnRef::base("descripcion")],
        sortable: audit_sorts(vec![("nombre", ColumnRef::base("nombre"))]),
        messages: Messages {
            not_found: "Especie con ID {id} no encontrada",
            already_inactive: "La especie con ID {id} ya está inactiva",
            already_active: "La especie con ID {id} ya está activa",
            deleted: "Especie con ID {id} eliminada exitosamente",
            delete_blocked_by_storage:
                "No se puede eliminar la especie porque tiene registros relacionados",
        },
    }
}

fn raza() -> EntityDescriptor {
    EntityDescriptor {
        kind: EntityKind::Raza,
        table: TableRef::new("raza", "raza_id"),
        label: "raza",
        plural: "razas",
        name_column: "nombre",
        text_fields: vec![TextField {
            column: "nombre",
            required: Some("El nombre de la raza no puede estar vacío"),
            create_only: false,
        }],
        defaults: Vec::new(),
        unique_scopes: vec![UniqueScope {
            column: "nombre",
            normalized: true,
            scoped_by: Some("especie_id"),
            create_message: "Ya existe una raza con este nombre para esta especie",
            update_message: "Ya existe una raza con este nombre para esta especie",
        }],
        parents: vec![ParentRef {
            kind: EntityKind::Especie,
            fk_column: "especie_id",
            summary: vec![("nombre", "especie_nombre"), ("activo", "especie_activo")],
            inactive_on_create: "No se puede crear una raza para una especie inactiva",
            inactive_on_update: "No se puede asignar la raza a una especie inactiva",
            inactive_on_deactivate: Some("No se puede inactivar una raza de una especie inactiva"),
            inactive_on_reactivate: Some("No se puede reactivar una raza de una especie inactiva"),
            missing_on_write: "Especie no encontrada",
        }],
        consistency: Vec::new(),
        owned_collections: vec![OwnedCollection {
            table: "mascota",
            fk_column: "raza_id",
            message: "No se puede eliminar la raza porque tiene mascotas asociadas",
        }],
        delete_dependents: DependentCheck::default(),
        deactivate_dependents: DependentCheck::active(
            "raza_id",
            &["mascota"],
            "No se puede inactivar la raza porque tiene mascotas activas asociadas",
        ),
        deactivate_checks_parents: true,
        search_columns: vec![
            ColumnRef::base("nombre"),
            ColumnRef::base("descripcion"),
            ColumnRef::joined("especie", "nombre"),
        ],
        sortable: audit_sorts(vec![
            ("nombre", ColumnRef::base("nombre")),
            ("especie", ColumnRef::joined("especie", "nombre")),
        ]),
        messages: Messages {
            not_found: "Raza con ID {id} no encontrada",
            already_inactive: "La raza con ID {id} ya está inactiva",
            already_active: "La raza con ID {id} ya está activa",
            deleted: "Raza con ID {id} eliminada exitosamente",
            delete_blocked_by_storage:
                "No se puede eliminar la raza porque tiene registros relacionados",
        },
    }
}

fn cliente() -> EntityDescriptor {
    EntityDescriptor {
        kind: EntityKind::Cliente,
        table: TableRef::new("cliente", "cliente_id"),
        label: "cliente",
        plural: "clientes",
        name_column: "nombre",
        text_fields: vec![
            TextField {
                column: "nombre",
                required: Some("El nombre del cliente no puede estar vacío"),
                create_only: false,
            },
            TextField {
                column: "cedula",
                required: Some("Debe proporcionar cédula"),
                create_only: true,
            },
            TextField {
                column: "ruc",
                required: None,
                create_only: false,
            },
        ],
        defaults: Vec::new(),
        unique_scopes: vec![
            UniqueScope {
                column: "cedula",
                normalized: false,
                scoped_by: None,
                create_message: "Ya existe un cliente con esta cédula",
                update_message: "Ya existe otro cliente con esta cédula",
            },
            UniqueScope {
                column: "ruc",
                normalized: false,
                scoped_by: None,
                create_message: "Ya existe un cliente con este RUC",
                update_message: "Ya existe otro cliente con este RUC",
            },
        ],
        parents: Vec::new(),
        consistency: Vec::new(),
        owned_collections: Vec::new(),
        delete_dependents: DependentCheck::any(
            "cliente_id",
            &["factura", "mascota", "presupuesto"],
            "No se puede eliminar el cliente porque tiene registros relacionados con otras tablas.",
        ),
        deactivate_dependents: DependentCheck::any(
            "cliente_id",
            &["factura", "mascota", "presupuesto"],
            "No se puede inactivar el cliente porque tiene registros relacionados con otras tablas.",
        ),
        deactivate_checks_parents: false,
        search_columns: vec![
            ColumnRef::base("nombre"),
            ColumnRef::base("cedula"),
            ColumnRef::base("ruc"),
        ],
        sortable: audit_sorts(vec![
            ("nombre", ColumnRef::base("nombre")),
            ("cedula", ColumnRef::base("cedula")),
            ("ruc", ColumnRef::base("ruc")),
            ("telefono", ColumnRef::base("telefono")),
            ("fecha_nacimiento", ColumnRef::base("fecha_nacimiento")),
        ]),
        messages: Messages {
            not_found: "Cliente con ID {id} no encontrado",
            already_inactive: "El cliente con ID {id} ya está inactivo",
            already_active: "El cliente con ID {id} ya está activo",
            deleted: "Cliente con ID {id} eliminado exitosamente",
            delete_blocked_by_storage:
                "No se puede eliminar el cliente porque tiene registros relacionados con otras tablas.",
        },
    }
}

fn mascota() -> EntityDescriptor {
    EntityDescriptor {
        kind: EntityKind::Mascota,
        table: TableRef::new("mascota", "mascota_id"),
        label: "mascota",
        plural: "mascotas",
        name_column: "nombre",
        text_fields: vec![
            TextField {
                column: "nombre",
                required: Some("El nombre de la mascota no puede estar vacío"),
                create_only: false,
            },
            TextField {
                column: "chip",
                required: None,
                create_only: false,
            },
        ],
        defaults: vec![("sexo", JsonValue::from("F"))],
        unique_scopes: vec![UniqueScope {
            column: "chip",
            normalized: false,
            scoped_by: None,
            create_message: "Ya existe una mascota con este número de chip",
            update_message: "Ya existe otra mascota con este número de chip",
        }],
        parents: vec![
            ParentRef {
                kind: EntityKind::Cliente,
                fk_column: "cliente_id",
                summary: vec![("nombre", "cliente_nombre")],
                inactive_on_create: "No se puede crear una mascota para un cliente inactivo",
                inactive_on_update: "No se puede asignar la mascota a un cliente inactivo",
                inactive_on_deactivate: Some(
                    "No se puede inactivar una mascota de un cliente inactivo",
                ),
                inactive_on_reactivate: Some(
                    "No se puede reactivar una mascota de un cliente inactivo",
                ),
                missing_on_write: "Cliente no encontrado",
            },
            ParentRef {
                kind: EntityKind::Especie,
                fk_column: "especie_id",
                summary: vec![("nombre", "especie_nombre")],
                inactive_on_create: "No se puede crear una mascota de una especie inactiva",
                inactive_on_update: "No se puede asignar la mascota a una especie inactiva",
                inactive_on_deactivate: Some(
                    "No se puede inactivar una mascota de una especie inactiva",
                ),
                inactive_on_reactivate: Some(
                    "No se puede reactivar una mascota de una especie inactiva",
                ),
                missing_on_write: "Especie no encontrada",
            },
            ParentRef {
                kind: EntityKind::Raza,
                fk_column: "raza_id",
                summary: vec![("nombre", "raza_nombre")],
                inactive_on_create: "No se puede crear una mascota de una raza inactiva",
                inactive_on_update: "No se puede asignar la mascota a una raza inactiva",
                inactive_on_deactivate: Some(
                    "No se puede inactivar una mascota de una raza inactiva",
                ),
                inactive_on_reactivate: Some(
                    "No se puede reactivar una mascota de una raza inactiva",
                ),
                missing_on_write: "Raza no encontrada",
            },
        ],
        consistency: vec![ConsistencyRule {
            via: EntityKind::Raza,
            parent_column: "especie_id",
            local_column: "especie_id",
            message: "La raza seleccionada no pertenece a la especie especificada",
        }],
        owned_collections: Vec::new(),
        delete_dependents: DependentCheck::any(
            "mascota_id",
            &["historial_medico", "cita", "vacuna", "consulta", "tratamiento"],
            "No se puede eliminar la mascota porque tiene registros relacionados",
        ),
        deactivate_dependents: DependentCheck::any(
            "mascota_id",
            &["cita"],
            "No se puede inactivar la mascota porque tiene registros activos relacionados",
        ),
        deactivate_checks_parents: true,
        search_columns: vec![
            ColumnRef::base("nombre"),
            ColumnRef::base("chip"),
            ColumnRef::base("pelaje"),
            ColumnRef::base("descripcion"),
            ColumnRef::joined("cliente", "nombre"),
            ColumnRef::joined("especie", "nombre"),
            ColumnRef::joined("raza", "nombre"),
        ],
        sortable: audit_sorts(vec![
            ("nombre", ColumnRef::base("nombre")),
            ("fecha_nacimiento", ColumnRef::base("fecha_nacimiento")),
            ("cliente", ColumnRef::joined("cliente", "nombre")),
            ("especie", ColumnRef::joined("especie", "nombre")),
            ("raza", ColumnRef::joined("raza", "nombre")),
        ]),
        messages: Messages {
            not_found: "Mascota con ID {id} no encontrada",
            already_inactive: "La mascota con ID {id} ya está inactiva",
            already_active: "La mascota con ID {id} ya está activa",
            deleted: "Mascota con ID {id} eliminada exitosamente",
            delete_blocked_by_storage:
                "No se puede eliminar la mascota porque tiene registros relacionados",
        },
    }
}
