#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;

use terrenos_api::app::{self, AppState};
use terrenos_api::auth::{generate_jwt, AccessLevel, Claims};
use terrenos_api::database::entities::{AuditAction, NewSimpleEntry};
use terrenos_api::database::{AuditStore, MemoryAuditStore};
use terrenos_api::tenant::{TenantContext, TenantId};

pub const NORTE: i64 = 1;
pub const SUR: i64 = 2;
pub const CERRADA: i64 = 3;

/// In-process application over a memory store with three tenants (one inactive)
pub struct TestApp {
    pub store: MemoryAuditStore,
    pub state: AppState,
    pub router: Router,
}

pub fn tid(id: i64) -> TenantId {
    TenantId::try_from(id).expect("valid tenant id")
}

pub fn spawn_app() -> TestApp {
    let store = MemoryAuditStore::new();
    store.upsert_tenant(tid(NORTE), "Inmobiliaria Norte", true);
    store.upsert_tenant(tid(SUR), "Desarrollos Sur", true);
    store.upsert_tenant(tid(CERRADA), "Terrenos Cerrada", false);

    let state = AppState::from_store(Arc::new(store.clone()), 12);
    let router = app::router(state.clone());

    TestApp { store, state, router }
}

pub fn token(tenant: Option<i64>, access: AccessLevel) -> String {
    let claims = Claims::new(format!("{:?}@example.com", access).to_lowercase(), Some(7), tenant, access);
    generate_jwt(&claims).expect("token generation")
}

pub fn admin_token(tenant: i64) -> String {
    token(Some(tenant), AccessLevel::Admin)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = router.clone().oneshot(request).await.context("router call")?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Ok((status, body))
}

/// Insert `count` simple entries for `tenant` stamped at `at`
pub async fn seed_simple(store: &MemoryAuditStore, tenant: i64, count: usize, at: DateTime<Utc>) -> Result<()> {
    TenantContext::with_tenant(tid(tenant), async {
        let active = TenantContext::require()?;
        for i in 0..count {
            let entry = NewSimpleEntry {
                user_id: Some(7),
                user_email: Some("seed@example.com".into()),
                action: AuditAction::ViewReport,
                description: Some(format!("seed {}", i)),
                ip_address: None,
                user_agent: None,
                metadata: None,
                recorded_at: at,
            };
            store.insert_simple(&active, entry).await?;
        }
        anyhow::Ok(())
    })
    .await?
}
