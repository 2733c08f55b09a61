use axum::{
    extract::{Path, State},
    Json,
};
use conffree_shared::{Room, RoomsResponse};

use crate::error::{ApiError, ApiResult};
use crate::store::RoomStore;

pub async fn list_rooms(State(store): State<RoomStore>) -> Json<RoomsResponse> {
    Json(RoomsResponse::new(store.list_all().await))
}

pub async fn list_free_rooms(State(store): State<RoomStore>) -> Json<RoomsResponse> {
    Json(RoomsResponse::new(store.list_free().await))
}

pub async fn list_busy_rooms(State(store): State<RoomStore>) -> Json<RoomsResponse> {
    Json(RoomsResponse::new(store.list_busy().await))
}

pub async fn get_room(
    State(store): State<RoomStore>,
    Path(email): Path<String>,
) -> ApiResult<Json<Room>> {
    store
        .get(&email)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Room {}", email)))
}
