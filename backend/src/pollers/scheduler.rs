use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

use super::classifier::classify;
use super::feed::{FeedError, FreeBusySource};
use crate::config::RoomConfig;
use crate::store::RoomStore;

/// Outcome counts of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct RoomPoller {
    source: Arc<dyn FreeBusySource>,
    store: RoomStore,
    rooms: Vec<RoomConfig>,
    timezone: Tz,
}

impl RoomPoller {
    pub fn new(
        source: Arc<dyn FreeBusySource>,
        store: RoomStore,
        rooms: Vec<RoomConfig>,
        timezone: Tz,
    ) -> Self {
        Self {
            source,
            store,
            rooms,
            timezone,
        }
    }

    /// Poll every room once, as of the current time.
    pub async fn poll(&self) -> PollSummary {
        self.poll_at(Utc::now().with_timezone(&self.timezone)).await
    }

    /// Poll every room concurrently as of `now`.
    ///
    /// A failing room keeps its previous snapshot and does not affect the
    /// others.
    pub async fn poll_at(&self, now: DateTime<Tz>) -> PollSummary {
        let results = join_all(self.rooms.iter().map(|room| self.poll_room(room, now))).await;

        let mut summary = PollSummary::default();
        for (room, result) in self.rooms.iter().zip(results) {
            match result {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(room = %room.email, "Keeping previous state, poll failed: {}", e);
                }
            }
        }

        summary
    }

    async fn poll_room(&self, room: &RoomConfig, now: DateTime<Tz>) -> Result<(), FeedError> {
        let entries = self.source.fetch(room, now).await?;
        let classification = classify(now, entries);

        tracing::debug!(
            room = %room.email,
            relevant = classification.freebusy.len(),
            status = ?classification.status,
            current = ?classification.current,
            next = ?classification.next,
            "Classified room"
        );

        self.store
            .replace(classification.into_room(&room.email, &room.label))
            .await;
        Ok(())
    }
}

/// Poll immediately, then every `interval`, forever.
///
/// A cycle always finishes before the next one starts; ticks missed while a
/// slow cycle runs are delayed rather than fired back to back.
pub async fn start_room_polling_task(poller: RoomPoller, interval: Duration) {
    tracing::info!(
        "Room poller started (interval: {:?}, rooms: {})",
        interval,
        poller.rooms.len()
    );

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        tracing::debug!("Running room poll cycle");

        let summary = poller.poll().await;
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Room poll cycle finished"
        );
    }
}
