use axum::Json;
use conffree_shared::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
