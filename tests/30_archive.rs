mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::{admin_token, get, post_json, seed_simple, send, spawn_app, tid, token, CERRADA, NORTE, SUR};
use terrenos_api::auth::AccessLevel;

#[tokio::test]
async fn tenant_archive_only_touches_the_callers_tenant() -> Result<()> {
    let app = spawn_app();
    let aged = Utc::now() - Duration::days(400);
    seed_simple(&app.store, NORTE, 4, aged).await?;
    seed_simple(&app.store, NORTE, 2, Utc::now()).await?;
    seed_simple(&app.store, SUR, 3, aged).await?;

    let norte = admin_token(NORTE);
    let (status, body) = send(&app.router, post_json("/api/v1/auditoria/archivar", &norte, json!({}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["simple"], 4);
    assert_eq!(body["data"]["critical"], 0);

    assert_eq!(app.store.archived_for(tid(NORTE)).len(), 4);
    assert!(app.store.archived_for(tid(SUR)).is_empty());

    // Recent entries remain readable
    let (_, body) = send(&app.router, get("/api/v1/auditoria/simple", Some(&norte))).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn root_archives_every_tenant_once() -> Result<()> {
    let app = spawn_app();
    let aged = Utc::now() - Duration::days(400);
    seed_simple(&app.store, NORTE, 500, aged).await?;
    seed_simple(&app.store, SUR, 300, aged).await?;
    seed_simple(&app.store, CERRADA, 200, aged).await?;

    let root = token(None, AccessLevel::Root);

    let (status, body) = send(&app.router, post_json("/api/v1/admin/auditoria/archivar", &root, json!({}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["detail"]["tenants_processed"], 3);
    assert_eq!(body["data"]["detail"]["archived_simple"], 1000);
    assert_eq!(body["data"]["detail"]["failures"], json!([]));

    let (_, body) = send(&app.router, post_json("/api/v1/admin/auditoria/archivar", &root, json!({}))).await?;
    assert_eq!(body["data"]["detail"]["archived_simple"], 0);

    assert_eq!(app.store.archived_for(tid(NORTE)).len(), 500);
    assert_eq!(app.store.archived_for(tid(SUR)).len(), 300);
    assert_eq!(app.store.archived_for(tid(CERRADA)).len(), 200);
    Ok(())
}

#[tokio::test]
async fn cross_tenant_archive_requires_root() -> Result<()> {
    let app = spawn_app();

    let (status, _) = send(
        &app.router,
        post_json("/api/v1/admin/auditoria/archivar", &admin_token(NORTE), json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = send(&app.router, get("/api/v1/admin/auditoria/archivar", None)).await?;
    assert_ne!(response.0, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn root_token_cannot_reach_tenant_routes_without_a_tenant() -> Result<()> {
    let app = spawn_app();
    let root = token(None, AccessLevel::Root);

    let (status, _) = send(&app.router, post_json("/api/v1/auditoria/archivar", &root, json!({}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
