//! Client lifecycle

use crate::support::{assert_error, household, Faults, TestApp};
use chrono::NaiveDate;
use serde_json::json;
use vet_registry::models::{ClienteCreate, ClienteUpdate};
use vet_registry::ErrorKind;

const DELETE_BLOCKED: &str =
    "No se puede eliminar el cliente porque tiene registros relacionados con otras tablas.";
const DEACTIVATE_BLOCKED: &str =
    "No se puede inactivar el cliente porque tiene registros relacionados con otras tablas.";

#[tokio::test]
async fn create_normalizes_identifiers() -> anyhow::Result<()> {
    let app = TestApp::new();

    let cliente = app
        .state
        .clientes
        .create(
            ClienteCreate {
                nombre: " Ana Torres ".to_string(),
                cedula: Some(" 0912345678 ".to_string()),
                ruc: Some("   ".to_string()),
                telefono: Some("0991234567".to_string()),
                fecha_nacimiento: NaiveDate::from_ymd_opt(1990, 4, 12),
                ..Default::default()
            },
            Some("recepcion"),
        )
        .await?;

    assert_eq!(cliente.nombre, "Ana Torres");
    assert_eq!(cliente.cedula.as_deref(), Some("0912345678"));
    assert_eq!(cliente.ruc, None);
    assert_eq!(cliente.fecha_nacimiento, NaiveDate::from_ymd_opt(1990, 4, 12));
    assert!(cliente.activo);
    Ok(())
}

#[tokio::test]
async fn cedula_is_required_on_create() -> anyhow::Result<()> {
    let app = TestApp::new();

    let missing = app
        .state
        .clientes
        .create(
            ClienteCreate {
                nombre: "Ana".to_string(),
                ..Default::default()
            },
            None,
        )
        .await;
    assert_error(missing, ErrorKind::BadRequest, "Debe proporcionar cédula");

    let blank = app.cliente("Marta", "  ").await;
    let err = blank.unwrap_err().downcast::<vet_registry::Error>()?;
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.to_string(), "Debe proporcionar cédula");

    assert_eq!(app.row_count("cliente"), 0);
    Ok(())
}

#[tokio::test]
async fn clients_without_ruc_never_conflict() -> anyhow::Result<()> {
    let app = TestApp::new();
    app.cliente("Luis", "0900000105").await?;
    app.cliente("Luis", "0900000106").await?;
    assert_eq!(app.row_count("cliente"), 2);
    Ok(())
}

#[tokio::test]
async fn duplicate_cedula_and_ruc_are_conflicts() -> anyhow::Result<()> {
    let app = TestApp::new();
    app.state
        .clientes
        .create(
            ClienteCreate {
                nombre: "Ana".to_string(),
                cedula: Some("0912345678".to_string()),
                ruc: Some("0912345678001".to_string()),
                ..Default::default()
            },
            None,
        )
        .await?;

    assert_error(
        app.state
            .clientes
            .create(
                ClienteCreate {
                    nombre: "Otra".to_string(),
                    cedula: Some("0912345678".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::Conflict,
        "Ya existe un cliente con esta cédula",
    );
    assert_error(
        app.state
            .clientes
            .create(
                ClienteCreate {
                    nombre: "Otra".to_string(),
                    cedula: Some("0923456789".to_string()),
                    ruc: Some("0912345678001".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::Conflict,
        "Ya existe un cliente con este RUC",
    );
    assert_eq!(app.row_count("cliente"), 1);
    Ok(())
}

#[tokio::test]
async fn update_checks_identifiers_against_other_clients() -> anyhow::Result<()> {
    let app = TestApp::new();
    app.cliente("Ana", "0912345678").await?;
    let luis = app.cliente("Luis", "0987654321").await?;

    assert_error(
        app.state
            .clientes
            .update(
                luis.cliente_id,
                ClienteUpdate {
                    cedula: Some(Some("0912345678".to_string())),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::Conflict,
        "Ya existe otro cliente con esta cédula",
    );

    // Resubmitting its own cedula is fine.
    let updated = app
        .state
        .clientes
        .update(
            luis.cliente_id,
            ClienteUpdate {
                cedula: Some(Some("0987654321".to_string())),
                telefono: Some(Some("042000000".to_string())),
                ..Default::default()
            },
            Some("caja"),
        )
        .await?;
    assert_eq!(updated.telefono.as_deref(), Some("042000000"));
    assert_eq!(updated.usuario_mod.as_deref(), Some("caja"));

    let cleared = app
        .state
        .clientes
        .update(
            luis.cliente_id,
            ClienteUpdate {
                cedula: Some(None),
                ..Default::default()
            },
            None,
        )
        .await?;
    assert_eq!(cleared.cedula, None);
    Ok(())
}

#[tokio::test]
async fn blank_name_on_update_is_bad_request() -> anyhow::Result<()> {
    let app = TestApp::new();
    let ana = app.cliente("Ana", "0900000107").await?;
    assert_error(
        app.state
            .clientes
            .update(
                ana.cliente_id,
                ClienteUpdate {
                    nombre: Some("  ".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::BadRequest,
        "El nombre del cliente no puede estar vacío",
    );
    Ok(())
}

#[tokio::test]
async fn storage_unique_violation_on_update_uses_update_message() -> anyhow::Result<()> {
    let app = TestApp::new();
    app.cliente("Ana", "0912345678").await?;
    let luis = app.cliente("Luis", "0900000108").await?;

    app.set_faults(Faults {
        blind_scope_lookups: true,
        ..Default::default()
    });

    assert_error(
        app.state
            .clientes
            .update(
                luis.cliente_id,
                ClienteUpdate {
                    cedula: Some(Some("0912345678".to_string())),
                    ..Default::default()
                },
                None,
            )
            .await,
        ErrorKind::Conflict,
        "Ya existe otro cliente con esta cédula",
    );
    Ok(())
}

#[tokio::test]
async fn delete_is_blocked_by_any_pet() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    app.state
        .mascotas
        .deactivate(h.mascota.mascota_id, None)
        .await?;

    assert_error(
        app.state.clientes.delete(h.cliente.cliente_id).await,
        ErrorKind::Conflict,
        DELETE_BLOCKED,
    );
    assert_error(
        app.state.clientes.deactivate(h.cliente.cliente_id, None).await,
        ErrorKind::Conflict,
        DEACTIVATE_BLOCKED,
    );
    Ok(())
}

#[tokio::test]
async fn delete_is_blocked_by_invoices_when_that_table_exists() -> anyhow::Result<()> {
    let app = TestApp::new();
    let ana = app.cliente("Ana", "0900000109").await?;
    let luis = app.cliente("Luis", "0900000110").await?;

    app.add_dependent_table("factura", "cliente_id", "cliente", false);
    app.insert_row("factura", json!({ "cliente_id": ana.cliente_id }))
        .await?;

    assert_error(
        app.state.clientes.delete(ana.cliente_id).await,
        ErrorKind::Conflict,
        DELETE_BLOCKED,
    );

    let outcome = app.state.clientes.delete(luis.cliente_id).await?;
    assert_eq!(
        outcome.mensaje,
        format!("Cliente con ID {} eliminado exitosamente", luis.cliente_id)
    );
    Ok(())
}

#[tokio::test]
async fn scanner_fails_open_but_storage_still_guards_delete() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;
    let lone = app.cliente("Sin mascotas", "0900000111").await?;

    app.set_faults(Faults {
        failing_schema_lookups: true,
        ..Default::default()
    });

    app.state.clientes.delete(lone.cliente_id).await?;
    assert_error(
        app.state.clientes.delete(h.cliente.cliente_id).await,
        ErrorKind::Conflict,
        DELETE_BLOCKED,
    );
    assert_eq!(app.row_count("cliente"), 1);
    Ok(())
}

#[tokio::test]
async fn deactivate_proceeds_when_dependency_scan_fails() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;

    app.set_faults(Faults {
        failing_schema_lookups: true,
        ..Default::default()
    });

    let cliente = app
        .state
        .clientes
        .deactivate(h.cliente.cliente_id, None)
        .await?;
    assert!(!cliente.activo);
    Ok(())
}

#[tokio::test]
async fn reactivation_round_trip() -> anyhow::Result<()> {
    let app = TestApp::new();
    let id = app.cliente("Ana", "0900000112").await?.cliente_id;

    app.state.clientes.deactivate(id, None).await?;
    assert_error(
        app.state.clientes.deactivate(id, None).await,
        ErrorKind::BadRequest,
        &format!("El cliente con ID {id} ya está inactivo"),
    );

    let cliente = app.state.clientes.reactivate(id, None).await?;
    assert!(cliente.activo);
    assert_error(
        app.state.clientes.reactivate(id, None).await,
        ErrorKind::BadRequest,
        &format!("El cliente con ID {id} ya está activo"),
    );
    Ok(())
}

#[tokio::test]
async fn missing_client_is_not_found() -> anyhow::Result<()> {
    let app = TestApp::new();
    assert_error(
        app.state.clientes.get(12).await,
        ErrorKind::NotFound,
        "Cliente con ID 12 no encontrado",
    );
    assert_error(
        app.state.clientes.delete(12).await,
        ErrorKind::NotFound,
        "Cliente con ID 12 no encontrado",
    );
    Ok(())
}

#[tokio::test]
async fn read_failure_during_update_is_internal() -> anyhow::Result<()> {
    let app = TestApp::new();
    let id = app.cliente("Ana", "0900000113").await?.cliente_id;

    app.set_faults(Faults {
        failing_reads: true,
        ..Default::default()
    });

    let err = app
        .state
        .clientes
        .update(id, ClienteUpdate::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(
        err.to_string(),
        "Error al actualizar cliente: connection reset by peer"
    );
    Ok(())
}

#[tokio::test]
async fn misconfigured_dependent_table_does_not_hide_pets() -> anyhow::Result<()> {
    let app = TestApp::new();
    let h = household(&app).await?;

    // factura exists but references clients through another column, so checking it fails.
    app.add_dependent_table("factura", "cliente_ref", "cliente", false);

    assert_error(
        app.state.clientes.deactivate(h.cliente.cliente_id, None).await,
        ErrorKind::Conflict,
        DEACTIVATE_BLOCKED,
    );
    let cliente = app.state.clientes.get(h.cliente.cliente_id).await?;
    assert!(cliente.activo);
    Ok(())
}
