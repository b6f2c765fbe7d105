use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, Uri};
use axum::response::IntoResponse;
use phoning::models::Volunteer;
use phoning::orm::{Db, Model};
use phoning::pipeline::{Outcome, Pipeline};
use phoning::router::*;
use phoning::settings::Settings;
use phoning::sheets::{MemorySheet, SheetMirror};
use phoning::store::SqliteVolunteerStore;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};

async fn state() -> (AppState, Arc<MemorySheet>) {
    let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
    Volunteer::migrate(db.clone()).await.unwrap();
    let sheet = Arc::new(MemorySheet::new());
    let pipeline = Pipeline::new(
        Arc::new(SqliteVolunteerStore::new(db.clone())),
        Some(SheetMirror::new(sheet.clone())),
    );
    let state = AppState {
        db,
        pipeline,
        settings: Arc::new(Settings::default()),
    };
    (state, sheet)
}

fn body_json(resp: &Response) -> Value {
    serde_json::from_str(&resp.body).unwrap()
}

fn alice_body() -> Bytes {
    Bytes::from(
        json!({
            "prenom": "Alice",
            "nom": "Martin",
            "mobile": "0612345678",
            "email": "alice@example.com",
            "ville": "Paris",
            "code_postal": "75001",
            "disponibilite": "3-5h",
            "experience": "deja_fait"
        })
        .to_string(),
    )
}

// ========== Response struct ==========

#[test]
fn test_response_not_found() {
    let resp = Response::not_found();
    assert_eq!(resp.status_code, 404);
    assert!(resp.body.contains("404"));
}

#[test]
fn test_response_json_success() {
    let mut headers = HashMap::new();
    headers.insert("X-Test".into(), "yes".into());
    let resp = Response::json(json!({"foo": "bar"}), 201, headers);
    assert_eq!(resp.status_code, 201);
    assert_eq!(
        resp.headers.get("Content-Type").unwrap(),
        "application/json; charset=utf-8"
    );
    assert_eq!(resp.headers.get("X-Test").unwrap(), "yes");
    assert!(resp.body.contains("\"foo\":\"bar\""));
}

struct AlwaysFailsSerialize;

impl Serialize for AlwaysFailsSerialize {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Err(serde::ser::Error::custom("Forced failure"))
    }
}

#[test]
fn test_response_json_error_branch_always_fails() {
    let resp = Response::json(AlwaysFailsSerialize, 200, HashMap::new());
    assert_eq!(resp.status_code, 500);
    assert!(resp.body.contains("Serialization failed"));
    assert_eq!(
        resp.headers.get("Content-Type").unwrap(),
        "application/json; charset=utf-8"
    );
}

#[test]
fn test_status_text_variants() {
    assert_eq!(status_text(200), "OK");
    assert_eq!(status_text(400), "Bad Request");
    assert_eq!(status_text(404), "Not Found");
    assert_eq!(status_text(409), "Conflict");
    assert_eq!(status_text(500), "Internal Server Error");
    assert_eq!(status_text(503), "Service Unavailable");
    assert_eq!(status_text(590), "Unknown");
}

#[test]
fn test_outcome_bodies() {
    let ok = Response::from_outcome(&Outcome::Success(42));
    assert_eq!(ok.status_code, 200);
    assert_eq!(body_json(&ok), json!({ "success": true, "id": 42 }));

    let conflict = Response::from_outcome(&Outcome::ConflictError);
    assert_eq!(conflict.status_code, 409);
    assert_eq!(
        body_json(&conflict),
        json!({ "error": "Cette adresse email a deja ete utilisee." })
    );

    let failed = Response::from_outcome(&Outcome::PersistenceError);
    assert_eq!(failed.status_code, 500);
    assert!(body_json(&failed)["error"].is_string());
}

#[test]
fn test_into_axum_response_keeps_status_and_headers() {
    let resp = Response::from_outcome(&Outcome::ConflictError).into_response();
    assert_eq!(resp.status().as_u16(), 409);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json; charset=utf-8"
    );
}

// ========== Handlers ==========

#[tokio::test]
async fn test_submit_handler_success_then_conflict() {
    let (state, sheet) = state().await;

    let first = submit_handler(State(state.clone()), alice_body()).await;
    assert_eq!(first.status_code, 200);
    let body = body_json(&first);
    assert_eq!(body["success"], json!(true));
    assert!(body["id"].is_i64());
    assert_eq!(sheet.rows()[1][7], "3-5h/semaine");

    let second = submit_handler(State(state), alice_body()).await;
    assert_eq!(second.status_code, 409);
    assert_eq!(
        body_json(&second)["error"],
        "Cette adresse email a deja ete utilisee."
    );
}

#[tokio::test]
async fn test_submit_handler_missing_fields() {
    let (state, _) = state().await;
    let resp = submit_handler(State(state), Bytes::from_static(b"{\"prenom\":\"Alice\"}")).await;
    assert_eq!(resp.status_code, 400);
    assert_eq!(
        body_json(&resp)["error"],
        "Prenom, nom, email et mobile sont obligatoires"
    );
}

#[tokio::test]
async fn test_submit_handler_malformed_body() {
    let (state, _) = state().await;
    let resp = submit_handler(State(state), Bytes::from_static(b"not json")).await;
    assert_eq!(resp.status_code, 500);
    assert_eq!(body_json(&resp)["error"], "Une erreur est survenue");
}

#[tokio::test]
async fn test_submit_handler_sheet_down_still_succeeds() {
    let (state, sheet) = state().await;
    sheet.set_offline(true);
    let resp = submit_handler(State(state), alice_body()).await;
    assert_eq!(resp.status_code, 200);
    assert!(body_json(&resp)["id"].is_i64());
}

#[tokio::test]
async fn test_health_handler() {
    let (state, _) = state().await;
    let resp = health_handler(State(state)).await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(body_json(&resp), json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let resp = not_found_handler(Method::GET, Uri::from_static("/api/unknown")).await;
    assert_eq!(resp.status_code, 404);
    assert_eq!(status_text(resp.status_code), "Not Found");
}

#[tokio::test]
async fn test_health_handler_reports_unavailable_store() {
    let (state, _) = state().await;
    state.db.pool().close().await;
    let resp = health_handler(State(state)).await;
    assert_eq!(resp.status_code, 503);
    assert_eq!(body_json(&resp), json!({ "status": "unavailable" }));
}

#[tokio::test]
async fn test_build_router_registers_routes() {
    let (state, _) = state().await;
    // Construction panics on conflicting or malformed routes.
    let _app = build_router(state);
}
