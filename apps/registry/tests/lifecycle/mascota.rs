//! Pet lifecycle

use crate::support::{assert_error, household, Faults, TestApp};
use serde_json::json;
use vet_registry::db::query::TableRef;
use vet_registry::db::RecordStore;
use vet_registry::models::{MascotaCreate, MascotaUpdate, Sexo};
use vet_registry::ErrorKind;

#[tokio::test]
async fn create_defaults_sex_and_attaches_summaries() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;

    let max = &h.mascota;
    assert_eq!(max.nombre, "Max");
    assert_eq!(max.sexo, Some(Sexo::F));
    assert_eq!(max.cliente.nombre.as_deref(), Some("Ana Torres"));
    assert_eq!(max.especie.nombre.as_deref(), Some("Canino"));
    assert_eq!(max.raza.nombre.as_deref(), Some("Labrador"));

    let fetched = app.state.mascotas.get(max.mascota_id).await?;
    assert_eq!(&fetched, max);
    Ok(())
}

#[tokio::test]
async fn breed_must_belong_to_species() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let felino = app.especie("Felino").await?;
    let siames = app.raza(felino.especie_id, "Siamés").await?;

    let result = app
        .mascota(
            h.cliente.cliente_id,
            h.especie.especie_id,
            siames.raza_id,
            "Luna",
        )
        .await;
    let err = result.unwrap_err().downcast::<vet_registry::Error>()?;
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(
        err.to_string(),
        "La raza seleccionada no pertenece a la especie especificada"
    );
    assert_eq!(app.row_count("mascota"), 1);
    Ok(())
}

#[tokio::test]
async fn inactive_or_missing_parents_block_create() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let moroso = app.cliente("Moroso", "0900000114").await?;
    app.state.clientes.deactivate(moroso.cliente_id, None).await?;

    let input = |cliente_id, raza_id| MascotaCreate {
        cliente_id,
        especie_id: h.especie.especie_id,
        raza_id,
        nombre: "Rocky".to_string(),
        ..Default::default()
    };

    assert_error(
        app.state
            .mascotas
            .create(input(moroso.cliente_id, h.raza.raza_id), None)
            .await,
        ErrorKind::BadRequest,
        "No se puede crear una mascota para un cliente inactivo",
    );
    assert_error(
        app.state
            .mascotas
            .create(input(h.cliente.cliente_id, 77), None)
            .await,
        ErrorKind::NotFound,
        "Raza con ID 77 no encontrada",
    );

    let retired = app.raza(h.especie.especie_id, "Dálmata").await?;
    app.state.razas.deactivate(retired.raza_id, None).await?;
    assert_error(
        app.state
            .mascotas
            .create(input(h.cliente.cliente_id, retired.raza_id), None)
            .await,
        ErrorKind::BadRequest,
        "No se puede crear una mascota de una raza inactiva",
    );

    assert_eq!(app.row_count("mascota"), 1);
    Ok(())
}

#[tokio::test]
async fn chip_numbers_are_unique() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;

    let chipped = |nombre: &str, chip: &str| MascotaCreate {
        cliente_id: h.cliente.cliente_id,
        especie_id: h.especie.especie_id,
        raza_id: h.raza.raza_id,
        nombre: nombre.to_string(),
        chip: Some(chip.to_string()),
        ..Default::default()
    };

    let toby = app
        .state
        .mascotas
        .create(chipped("Toby", " 985112003 "), None)
        .await?;
    assert_eq!(toby.chip.as_deref(), Some("985112003"));

    assert_error(
        app.state
            .mascotas
            .create(chipped("Otro", "985112003"), None)
            .await,
        ErrorKind::Conflict,
        "Ya existe una mascota con este número de chip",
    );

    // Blank chips are stored as NULL and never collide.
    app.state.mascotas.create(chipped("Sin chip", " "), None).await?;
    let other = app.state.mascotas.create(chipped("Tampoco", ""), None).await?;
    assert_eq!(other.chip, None);

    assert_error(
        app.state
            .mascotas
            .update(
                h.mascota.mascota_id,
                MascotaUpdate {
                    chip: Some(Some("985112003".to_string())),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::Conflict,
        "Ya existe otra mascota con este número de chip",
    );
    Ok(())
}

#[tokio::test]
async fn update_rechecks_breed_species_consistency() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let felino = app.especie("Felino").await?;
    let siames = app.raza(felino.especie_id, "Siamés").await?;

    assert_error(
        app.state
            .mascotas
            .update(
                h.mascota.mascota_id,
                MascotaUpdate {
                    raza_id: Some(siames.raza_id),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::BadRequest,
        "La raza seleccionada no pertenece a la especie especificada",
    );
    assert_error(
        app.state
            .mascotas
            .update(
                h.mascota.mascota_id,
                MascotaUpdate {
                    especie_id: Some(felino.especie_id),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::BadRequest,
        "La raza seleccionada no pertenece a la especie especificada",
    );

    let moved = app
        .state
        .mascotas
        .update(
            h.mascota.mascota_id,
            MascotaUpdate {
                especie_id: Some(felino.especie_id),
                raza_id: Some(siames.raza_id),
                sexo: Some(Sexo::M),
                ..Default::default()
            },
            Some("dra.vera"),
        )
        .await?;
    assert_eq!(moved.especie.nombre.as_deref(), Some("Felino"));
    assert_eq!(moved.raza.nombre.as_deref(), Some("Siamés"));
    assert_eq!(moved.sexo, Some(Sexo::M));
    assert_eq!(moved.usuario_mod.as_deref(), Some("dra.vera"));
    Ok(())
}

#[tokio::test]
async fn update_to_inactive_client_is_bad_request() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let moroso = app.cliente("Moroso", "0900000115").await?;
    app.state.clientes.deactivate(moroso.cliente_id, None).await?;

    assert_error(
        app.state
            .mascotas
            .update(
                h.mascota.mascota_id,
                MascotaUpdate {
                    cliente_id: Some(moroso.cliente_id),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::BadRequest,
        "No se puede asignar la mascota a un cliente inactivo",
    );
    Ok(())
}

#[tokio::test]
async fn delete_is_blocked_by_medical_history() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let id = h.mascota.mascota_id;

    app.add_dependent_table("historial_medico", "mascota_id", "mascota", false);
    let entry = app
        .insert_row("historial_medico", json!({ "mascota_id": id }))
        .await?;

    assert_error(
        app.state.mascotas.delete(id).await,
        ErrorKind::Conflict,
        "No se puede eliminar la mascota porque tiene registros relacionados",
    );

    let entry_id = entry["historial_medico_id"].as_i64().unwrap_or_default();
    app.store
        .delete(
            &TableRef::new("historial_medico", "historial_medico_id"),
            entry_id,
        )
        .await?;

    let outcome = app.state.mascotas.delete(id).await?;
    assert_eq!(outcome.mensaje, format!("Mascota con ID {id} eliminada exitosamente"));
    assert_eq!(app.row_count("mascota"), 0);
    Ok(())
}

#[tokio::test]
async fn deactivate_is_blocked_by_any_appointment() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let id = h.mascota.mascota_id;

    // Tables absent from the schema are skipped.
    let mascota = app.state.mascotas.deactivate(id, None).await?;
    assert!(!mascota.activo);
    app.state.mascotas.reactivate(id, None).await?;

    app.add_dependent_table("cita", "mascota_id", "mascota", true);
    app.insert_row("cita", json!({ "mascota_id": id, "activo": false }))
        .await?;

    assert_error(
        app.state.mascotas.deactivate(id, None).await,
        ErrorKind::Conflict,
        "No se puede inactivar la mascota porque tiene registros activos relacionados",
    );
    Ok(())
}

#[tokio::test]
async fn deactivate_under_inactive_client_is_bad_request() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;

    app.force_update("cliente", h.cliente.cliente_id, json!({ "activo": false }))
        .await?;

    assert_error(
        app.state.mascotas.deactivate(h.mascota.mascota_id, None).await,
        ErrorKind::BadRequest,
        "No se puede inactivar una mascota de un cliente inactivo",
    );
    Ok(())
}

#[tokio::test]
async fn reactivate_requires_active_breed() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let id = h.mascota.mascota_id;

    app.state.mascotas.deactivate(id, None).await?;
    app.state.razas.deactivate(h.raza.raza_id, None).await?;

    assert_error(
        app.state.mascotas.reactivate(id, None).await,
        ErrorKind::BadRequest,
        "No se puede reactivar una mascota de una raza inactiva",
    );
    assert_error(
        app.state.mascotas.deactivate(id, None).await,
        ErrorKind::BadRequest,
        &format!("La mascota con ID {id} ya está inactiva"),
    );

    app.state.razas.reactivate(h.raza.raza_id, None).await?;
    let mascota = app.state.mascotas.reactivate(id, None).await?;
    assert!(mascota.activo);
    Ok(())
}

#[tokio::test]
async fn list_by_cliente_returns_active_pets_by_name() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let (c, e, r) = (
        h.cliente.cliente_id,
        h.especie.especie_id,
        h.raza.raza_id,
    );
    app.mascota(c, e, r, "Bruno").await?;
    let old = app.mascota(c, e, r, "Abuelo").await?;
    app.state.mascotas.deactivate(old.mascota_id, None).await?;

    let other = app.cliente("Luis", "0900000116").await?;
    app.mascota(other.cliente_id, e, r, "Coco").await?;

    let pets = app.state.mascotas.list_by_cliente(c).await?;
    let names: Vec<&str> = pets.iter().map(|m| m.nombre.as_str()).collect();
    assert_eq!(names, vec!["Bruno", "Max"]);
    assert!(pets.iter().all(|m| m.activo));

    assert_error(
        app.state.mascotas.list_by_cliente(5_000).await,
        ErrorKind::NotFound,
        "Cliente con ID 5000 no encontrado",
    );
    Ok(())
}

#[tokio::test]
async fn storage_foreign_key_on_delete_maps_to_conflict() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let id = h.mascota.mascota_id;

    app.add_dependent_table("vacuna", "mascota_id", "mascota", false);
    app.insert_row("vacuna", json!({ "mascota_id": id })).await?;
    app.set_faults(Faults {
        blind_exists: true,
        ..Default::default()
    });

    assert_error(
        app.state.mascotas.delete(id).await,
        ErrorKind::Conflict,
        "No se puede eliminar la mascota porque tiene registros relacionados",
    );
    assert_eq!(app.row_count("mascota"), 1);
    Ok(())
}
