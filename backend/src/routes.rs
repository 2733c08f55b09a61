use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, rooms};
use crate::store::RoomStore;

pub fn api_routes() -> Router<RoomStore> {
    Router::new()
        // Room routes
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/free", get(rooms::list_free_rooms))
        .route("/rooms/busy", get(rooms::list_busy_rooms))
        .route("/rooms/:email", get(rooms::get_room))
}

/// Full application router over `store`.
pub fn create_app(store: RoomStore) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(store)
}
