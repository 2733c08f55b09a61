pub mod api;
pub mod models;

pub use api::{ErrorResponse, HealthResponse, RoomsResponse};
pub use models::{Interval, IntervalType, Room, RoomStatus};
