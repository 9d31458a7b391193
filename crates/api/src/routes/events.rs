//! Live zone snapshot stream (Server-Sent Events).

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use domain::services::zone_store::snapshot_stream;

use crate::app::AppState;

/// Name of the SSE event carrying the full active zone list.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// Stream every active-zone snapshot to the client.
///
/// GET /api/v1/zones/events
pub async fn zone_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let snapshots = snapshot_stream(state.store.subscribe());

    let stream = async_stream::stream! {
        debug!("Zone event subscriber connected");
        let mut snapshots = std::pin::pin!(snapshots);
        while let Some(snapshot) = snapshots.next().await {
            match Event::default().event(SNAPSHOT_EVENT).json_data(snapshot.as_slice()) {
                Ok(event) => yield Ok(event),
                Err(err) => warn!(error = %err, "Failed to encode zone snapshot"),
            }
        }
        debug!("Zone event stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
