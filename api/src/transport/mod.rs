//! MCP over HTTP. One of three variants is mounted, chosen by
//! [`TransportMode`]; all of them share the app's tool registry.

use std::convert::Infallible;

use axum::Router;
use axum::http::{HeaderName, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt, stream};
use kgraph_mcp_runtime::McpServer;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::TransportMode;
use crate::state::AppState;

pub mod session;
pub mod sse_keyed;
pub mod sse_single;
pub mod streamable;

pub const ENDPOINT_EVENT: &str = "endpoint";
pub const MESSAGE_EVENT: &str = "message";

pub fn router(mode: TransportMode) -> Router<AppState> {
    match mode {
        TransportMode::SseKeyed => sse_keyed::router(),
        TransportMode::SseSingle => sse_single::router(),
        TransportMode::Streamable => streamable::router(),
    }
}

pub(crate) fn message_event(message: &Value) -> Event {
    Event::default().event(MESSAGE_EVENT).data(message.to_string())
}

fn endpoint_event(endpoint: &str) -> Event {
    Event::default().event(ENDPOINT_EVENT).data(endpoint)
}

/// SSE response with proxy buffering disabled.
pub(crate) fn sse_response<S>(events: S) -> Response
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    response.headers_mut().insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

/// Event stream for one long-lived session: the `endpoint` event, then one
/// `message` event per response, handling inbox messages strictly in
/// arrival order. `guard` lives exactly as long as the stream, so dropping
/// the connection closes the session.
pub(crate) fn session_stream<G>(
    endpoint: String,
    server: McpServer,
    inbox: UnboundedReceiver<Value>,
    guard: G,
) -> Response
where
    G: Send + 'static,
{
    let opened = stream::once(async move { Ok::<_, Infallible>(endpoint_event(&endpoint)) });

    let replies = stream::unfold(
        (inbox, server, guard),
        |(mut inbox, server, guard)| async move {
            let Some(message) = inbox.recv().await else {
                return None;
            };
            let responses = server.handle_incoming_message(message).await;
            Some((responses, (inbox, server, guard)))
        },
    )
    .flat_map(|responses| {
        stream::iter(
            responses
                .into_iter()
                .map(|response| Ok::<_, Infallible>(message_event(&response))),
        )
    });

    sse_response(opened.chain(replies))
}
