use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast;

use crate::api::SharedState;
use crate::error::Result;

pub fn router() -> Router<SharedState> {
    Router::new().route("/stream", get(event_stream))
}

/// Stream domain events via Server-Sent Events.
///
/// Open dashboards receive `entity.changed` whenever a post, idea, account,
/// or role mutation lands, and refresh the affected view. A client that
/// falls behind gets a `lagged` event and should do a full reload. Left out
/// of the OpenAPI document; the schema there cannot describe a live stream.
async fn event_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data(r#"{"status":"ok"}"#));

        loop {
            match rx.recv().await {
                Ok(domain_event) => {
                    let data = serde_json::to_string(&domain_event).unwrap_or_default();
                    yield Ok(Event::default().event("entity.changed").data(data));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    yield Ok(Event::default()
                        .event("lagged")
                        .data(format!(r#"{{"missed":{n}}}"#)));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    ))
}
