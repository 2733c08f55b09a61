//! Background polling of room free/busy feeds.
//!
//! Runs as a tokio background task within the server process: fetch each
//! room's feed, classify it, and publish the result to the room store.

pub mod classifier;
pub mod feed;
pub mod ical;
pub mod scheduler;
mod time;

pub use feed::HttpFeedSource;
pub use scheduler::{start_room_polling_task, RoomPoller};
