mod common;

use std::collections::BTreeMap;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{admin_token, get, post_json, send, spawn_app, tid, NORTE, SUR};
use terrenos_api::database::entities::AuditOperation;
use terrenos_api::middleware::RequestMeta;
use terrenos_api::services::{Actor, FieldChange};
use terrenos_api::tenant::TenantContext;

fn vendedor() -> Actor {
    Actor {
        user_id: Some(12),
        email: Some("vendedor@example.com".into()),
    }
}

#[tokio::test]
async fn records_action_with_client_details() -> Result<()> {
    let app = spawn_app();
    let norte = admin_token(NORTE);

    let body = json!({
        "accion": "EXPORT_EXCEL",
        "descripcion": "Reporte de ventas",
        "metadata": { "registros": 120 }
    });
    let (status, body) = send(&app.router, post_json("/api/v1/auditoria/simple", &norte, body)).await?;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["accion"], "EXPORT_EXCEL");
    assert_eq!(body["data"]["tenant_id"], NORTE);
    assert_eq!(body["data"]["ip_address"], "203.0.113.9");
    assert_eq!(body["data"]["usuario_email"], "admin@example.com");
    assert_eq!(body["data"]["metadata"]["registros"], 120);
    assert_eq!(body["data"]["accion_descripcion"], "Exportación a Excel");
    Ok(())
}

#[tokio::test]
async fn unknown_actions_are_rejected() -> Result<()> {
    let app = spawn_app();
    let (status, _) = send(
        &app.router,
        post_json("/api/v1/auditoria/simple", &admin_token(NORTE), json!({ "accion": "HACK" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn simple_listing_filters_and_limits() -> Result<()> {
    let app = spawn_app();
    let norte = admin_token(NORTE);

    for accion in ["EXPORT_PDF", "EXPORT_PDF", "EXPORT_PDF", "UPLOAD_FILE"] {
        send(
            &app.router,
            post_json("/api/v1/auditoria/simple", &norte, json!({ "accion": accion })),
        )
        .await?;
    }

    let (_, body) = send(&app.router, get("/api/v1/auditoria/simple?accion=EXPORT_PDF", Some(&norte))).await?;
    let rows = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["accion"] == "EXPORT_PDF"));
    assert_eq!(rows[0]["accion_descripcion"], "Exportación a PDF");

    let (_, body) = send(&app.router, get("/api/v1/auditoria/simple?limit=2", Some(&norte))).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    // Window entirely in the past
    let (_, body) = send(
        &app.router,
        get(
            "/api/v1/auditoria/simple?fecha_inicio=2020-01-01&fecha_fin=2020-12-31",
            Some(&norte),
        ),
    )
    .await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn inverted_date_range_is_a_validation_error() -> Result<()> {
    let app = spawn_app();
    let (status, body) = send(
        &app.router,
        get(
            "/api/v1/auditoria/critica?fecha_inicio=2024-06-01&fecha_fin=2024-01-01",
            Some(&admin_token(NORTE)),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn old_end_date_without_start_lists_nothing() -> Result<()> {
    let app = spawn_app();
    let norte = admin_token(NORTE);
    send(
        &app.router,
        post_json("/api/v1/auditoria/simple", &norte, json!({ "accion": "EXPORT_CSV" })),
    )
    .await?;

    for uri in [
        "/api/v1/auditoria/simple?fecha_fin=2024-01-31",
        "/api/v1/auditoria/critica?fecha_fin=2024-01-31",
    ] {
        let (status, body) = send(&app.router, get(uri, Some(&norte))).await?;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(0), "{}", uri);
    }
    Ok(())
}

#[tokio::test]
async fn record_and_field_history() -> Result<()> {
    let app = spawn_app();
    let meta = RequestMeta::default();

    TenantContext::with_tenant(tid(NORTE), async {
        let mut changes = BTreeMap::new();
        changes.insert("precio".to_string(), (Some("250000".to_string()), Some("240000".to_string())));
        changes.insert("estado".to_string(), (Some("DISPONIBLE".to_string()), Some("APARTADO".to_string())));
        app.state
            .audit
            .record_changes(&vendedor(), "terrenos", 14, changes, AuditOperation::Update, None, &meta)
            .await?;

        let change = FieldChange {
            table_name: "terrenos".into(),
            record_id: 14,
            field: "precio".into(),
            old_value: Some("240000".into()),
            new_value: Some("235000".into()),
            operation: AuditOperation::PriceChange,
            reason: Some("Descuento de temporada".into()),
        };
        app.state.audit.record_critical_change(&vendedor(), change, &meta).await?;
        anyhow::Ok(())
    })
    .await??;

    let norte = admin_token(NORTE);

    let (status, body) = send(&app.router, get("/api/v1/auditoria/registro/terrenos/14", Some(&norte))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    let (_, body) = send(&app.router, get("/api/v1/auditoria/campo/terrenos/14/precio", Some(&norte))).await?;
    let rows = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["valor_nuevo"], "240000");
    assert_eq!(rows[1]["valor_nuevo"], "235000");
    assert_eq!(rows[1]["operacion_descripcion"], "Cambio de precio");

    let (_, body) = send(&app.router, get("/api/v1/auditoria/critica?tabla=terrenos", Some(&norte))).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    // Same record id in another tenant has no history
    let (_, body) = send(
        &app.router,
        get("/api/v1/auditoria/registro/terrenos/14", Some(&admin_token(SUR))),
    )
    .await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn last_logins_are_limited() -> Result<()> {
    let app = spawn_app();
    let meta = RequestMeta {
        ip_address: Some("198.51.100.20".into()),
        user_agent: Some("Mozilla/5.0".into()),
    };

    TenantContext::with_tenant(tid(NORTE), async {
        for _ in 0..3 {
            app.state.audit.record_login("vendedor@example.com", 12, &meta).await?;
        }
        app.state
            .audit
            .record_login_failed("vendedor@example.com", "Contraseña incorrecta", &meta)
            .await;
        anyhow::Ok(())
    })
    .await??;

    let norte = admin_token(NORTE);
    let (_, body) = send(&app.router, get("/api/v1/auditoria/logins/12", Some(&norte))).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    let (_, body) = send(&app.router, get("/api/v1/auditoria/logins/12?limit=1", Some(&norte))).await?;
    let rows = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["accion"], "LOGIN");
    assert_eq!(rows[0]["user_agent"], "Mozilla/5.0");

    let (_, body) = send(&app.router, get("/api/v1/auditoria/simple?accion=LOGIN_FAILED", Some(&norte))).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}
