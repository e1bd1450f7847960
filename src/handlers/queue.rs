use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::bookings::local_now;
use crate::services::queue::{build_queue, QueueEntry};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct QueueQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct QueueResponse {
    date: NaiveDate,
    entries: Vec<QueueEntry>,
}

fn load_queue(state: &AppState, date: NaiveDate) -> Result<QueueResponse, AppError> {
    let db = state.db()?;
    let bookings = queries::get_bookings_for_date(&db, date)?;
    let names = queries::get_service_names(&db)?;
    Ok(QueueResponse {
        date,
        entries: build_queue(&bookings, &names),
    })
}

// GET /api/queue
pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueResponse>, AppError> {
    let date = query.date.unwrap_or_else(|| local_now().date());
    Ok(Json(load_queue(&state, date)?))
}

// GET /api/queue/events (SSE)
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueueQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let date = query.date.unwrap_or_else(|| local_now().date());

    // Subscribe before the snapshot so no change slips between the two
    let rx = state.booking_tx.subscribe();
    let snapshot = load_queue(&state, date)?;

    let snapshot_stream = tokio_stream::once(Ok::<_, Infallible>(
        Event::default()
            .data(serde_json::to_string(&snapshot).unwrap_or_default())
            .event("snapshot"),
    ));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.date == date => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("booking")))
        }
        Ok(_) => None,
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "queue subscriber lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let combined = snapshot_stream.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}
