use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::cors::CorsLayer;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub item: String,
    pub done: bool,
}

#[derive(Deserialize)]
pub struct CreateItem {
    #[serde(default)]
    pub item: String,
}

/// Items in insertion order plus the next id to hand out.
#[derive(Default)]
pub struct Table {
    items: Vec<Item>,
    next_id: u64,
}

pub type Db = Arc<RwLock<Table>>;

type Reply = (StatusCode, Json<Value>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Table::default()));
    Router::new()
        .route("/", get(index))
        .route("/items", get(list_items))
        .route("/items/filter/{done}", get(filter_items))
        .route("/item/create", post(create_item))
        .route("/item/update/{id}/{done}", patch(update_item))
        .route("/item/delete/{id}", delete(delete_item))
        .layer(CorsLayer::permissive())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn message(status: StatusCode, text: &str) -> Reply {
    (status, Json(json!({ "message": text })))
}

async fn index() -> Json<Value> {
    Json(json!({ "message": "TODO APP" }))
}

async fn list_items(State(db): State<Db>) -> Json<Value> {
    let table = db.read().await;
    Json(json!({ "items": table.items }))
}

async fn filter_items(State(db): State<Db>, Path(done): Path<String>) -> Reply {
    let done = match done.as_str() {
        "true" => true,
        "false" => false,
        _ => return message(StatusCode::NOT_ACCEPTABLE, "please enter a valid done state (true/false)"),
    };
    let table = db.read().await;
    let items: Vec<&Item> = table.items.iter().filter(|i| i.done == done).collect();
    (StatusCode::OK, Json(json!({ "items": items })))
}

async fn create_item(State(db): State<Db>, input: Result<Json<CreateItem>, JsonRejection>) -> Reply {
    let Ok(Json(input)) = input else {
        return message(StatusCode::BAD_REQUEST, "invalid input");
    };
    let text = input.item.trim();
    if text.is_empty() {
        return message(StatusCode::NOT_ACCEPTABLE, "please enter an item");
    }

    let mut table = db.write().await;
    table.next_id += 1;
    let item = Item {
        id: table.next_id.to_string(),
        item: text.to_string(),
        done: false,
    };
    table.items.push(item.clone());
    tracing::info!(id = %item.id, "created todo item");
    (StatusCode::CREATED, Json(json!({ "items": item })))
}

async fn update_item(State(db): State<Db>, Path((id, done)): Path<(String, String)>) -> Reply {
    let mut table = db.write().await;
    let Some(item) = table.items.iter_mut().find(|i| i.id == id) else {
        return message(StatusCode::NOT_FOUND, "not found");
    };
    item.done = done == "true";
    tracing::info!(%id, done = item.done, "updated todo item");
    (
        StatusCode::OK,
        Json(json!({ "message": "successfully updated todo item", "todo": id })),
    )
}

async fn delete_item(State(db): State<Db>, Path(id): Path<String>) -> Reply {
    let mut table = db.write().await;
    let Some(pos) = table.items.iter().position(|i| i.id == id) else {
        return message(StatusCode::NOT_FOUND, "not found");
    };
    table.items.remove(pos);
    tracing::info!(%id, "deleted todo item");
    (
        StatusCode::OK,
        Json(json!({ "message": "successfully deleted todo item", "todo": id })),
    )
}
