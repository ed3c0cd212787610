//! HTTP routes: health, room listing, room id allocation and the socket upgrade.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::room::{Occupancy, RoomManager};
use crate::util::id::new_room_id;
use crate::ws::connection::ws_handler;

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomManager,
    pub write_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/ws", get(ws_handler))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_rooms(State(state): State<AppState>) -> Json<BTreeMap<String, Occupancy>> {
    Json(state.rooms.list_available())
}

#[derive(Debug, Serialize)]
pub struct CreatedRoom {
    pub room_id: String,
}

/// Hands out a fresh id; the room itself appears once someone joins it.
async fn create_room() -> Json<CreatedRoom> {
    Json(CreatedRoom {
        room_id: new_room_id(),
    })
}
