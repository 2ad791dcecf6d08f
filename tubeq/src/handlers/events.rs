use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse}
};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::events::JobEvent;
use crate::state::AppState;

fn to_sse(event: &JobEvent) -> Option<Event> {
    match Event::default().json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::warn!("Failed to encode event: {}", e);
            None
        }
    }
}

/// Server-sent stream of job events. Slow clients skip what they missed.
pub async fn stream_events(
    State(state): State<AppState>
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut events = BroadcastStream::new(state.events.subscribe());

    let stream = async_stream::stream! {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    if let Some(sse) = to_sse(&event) {
                        yield Ok(sse);
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::debug!("Event subscriber lagged, skipped {} events", skipped);
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
