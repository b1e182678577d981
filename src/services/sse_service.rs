use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::{
    dto::sse::ServerEvent,
    error::AppError,
    services::{sse_events, subscription::RoomSubscription},
    state::SharedState,
};

/// Subscribe the server's controller to `room`.
pub fn subscribe_room(state: &SharedState, room: &str) -> Result<RoomSubscription, AppError> {
    Ok(state.controller().subscribe(room)?)
}

/// Convert a room subscription into an SSE response, forwarding events and
/// releasing the subscription once the client disconnects.
pub fn to_sse_stream(
    mut subscription: RoomSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let room = subscription.room().clone();
        if let Some(handshake) = sse_events::handshake(&room) {
            if tx.send(Ok(to_event(handshake))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = subscription.next() => {
                    let Some(room_event) = next else { break };
                    let Some(payload) = sse_events::room_event(&room_event) else {
                        continue;
                    };
                    if tx.send(Ok(to_event(payload))).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!(%room, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
