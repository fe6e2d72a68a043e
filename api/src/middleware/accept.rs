use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;

const EVENT_STREAM: &str = "text/event-stream";

/// Which `/mcp` response bodies an `Accept` header admits. Wildcards count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Accepts {
    pub json: bool,
    pub event_stream: bool,
}

impl Accepts {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|range| range.split(';').next())
            .map(|media| media.trim().to_ascii_lowercase())
            .fold(Self::default(), |acc, media| Self {
                json: acc.json
                    || matches!(media.as_str(), "application/json" | "application/*" | "*/*"),
                event_stream: acc.event_stream
                    || matches!(media.as_str(), EVENT_STREAM | "text/*" | "*/*"),
            })
    }

    pub fn any(self) -> bool {
        self.json || self.event_stream
    }
}

/// Middleware that makes every `/mcp` request acceptable to the streaming
/// transport by adding `text/event-stream` to `Accept` when it is missing.
pub async fn ensure_event_stream_accept(mut req: Request, next: Next) -> Response {
    if !Accepts::from_headers(req.headers()).event_stream {
        let existing: Vec<&str> = req
            .headers()
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let merged = match existing.join(", ") {
            joined if joined.trim().is_empty() => format!("application/json, {EVENT_STREAM}"),
            joined => format!("{joined}, {EVENT_STREAM}"),
        };
        if let Ok(value) = HeaderValue::from_str(&merged) {
            req.headers_mut().insert(header::ACCEPT, value);
        }
    }

    next.run(req).await
}
