//! In-process stub of the audit-record backend

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Stored audits keyed by id
pub type Store = Arc<Mutex<BTreeMap<String, Value>>>;

pub struct StubBackend {
    pub base_url: String,
    pub store: Store,
}

impl StubBackend {
    pub fn count(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn data(&self, id: &str) -> Option<Value> {
        self.store
            .lock()
            .unwrap()
            .get(id)
            .map(|audit| audit["data"].clone())
    }
}

pub async fn spawn_backend() -> StubBackend {
    let store: Store = Arc::new(Mutex::new(BTreeMap::new()));

    let app = Router::new()
        .route("/ipqc-audits", get(list_audits).post(create_audit))
        .route("/ipqc-audits/search/by-filters", get(search_audits))
        .route(
            "/ipqc-audits/:id",
            get(fetch_audit).put(update_audit).delete(delete_audit),
        )
        .route("/generate-audit-report", post(generate_report))
        .with_state(store.clone());

    // Bind to random port.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubBackend {
        base_url: format!("http://{}", addr),
        store,
    }
}

async fn list_audits(
    State(store): State<Store>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let include_data = params.get("include_data").map_or(false, |v| v == "true");
    let audits: Vec<Value> = store
        .lock()
        .unwrap()
        .values()
        .map(|audit| {
            let mut audit = audit.clone();
            if !include_data {
                if let Some(obj) = audit.as_object_mut() {
                    obj.remove("data");
                }
            }
            audit
        })
        .collect();
    Json(Value::Array(audits))
}

async fn search_audits(
    State(store): State<Store>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let wanted = |key: &str| params.get(key).cloned().unwrap_or_default();
    let matches: Vec<Value> = store
        .lock()
        .unwrap()
        .values()
        .filter(|audit| {
            let data = &audit["data"];
            data["lineNumber"] == wanted("lineNumber")
                && data["date"] == wanted("date")
                && data["shift"] == wanted("shift")
        })
        .cloned()
        .collect();
    Json(json!({ "audits": matches }))
}

async fn create_audit(State(store): State<Store>, Json(body): Json<Value>) -> impl IntoResponse {
    let id = uuid::Uuid::new_v4().to_string();
    let audit = json!({
        "id": id,
        "name": body["name"],
        "timestamp": body["timestamp"],
        "data": body["data"],
    });
    store.lock().unwrap().insert(id, audit.clone());
    (StatusCode::CREATED, Json(audit))
}

async fn fetch_audit(State(store): State<Store>, Path(id): Path<String>) -> impl IntoResponse {
    match store.lock().unwrap().get(&id) {
        Some(audit) => Ok(Json(audit.clone())),
        None => Err((StatusCode::NOT_FOUND, format!("audit {} not found", id))),
    }
}

async fn update_audit(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut store = store.lock().unwrap();
    match store.get_mut(&id) {
        Some(audit) => {
            audit["name"] = body["name"].clone();
            audit["timestamp"] = body["timestamp"].clone();
            audit["data"] = body["data"].clone();
            Ok(Json(audit.clone()))
        }
        None => Err((StatusCode::NOT_FOUND, format!("audit {} not found", id))),
    }
}

async fn delete_audit(State(store): State<Store>, Path(id): Path<String>) -> StatusCode {
    match store.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn generate_report(Json(body): Json<Value>) -> impl IntoResponse {
    match body.get("audit_id").and_then(Value::as_str) {
        Some(id) => format!("PK-report:{}", id).into_bytes(),
        None if body.get("stages").is_some() => b"PK-report:inline".to_vec(),
        None => b"PK-report:empty".to_vec(),
    }
}
