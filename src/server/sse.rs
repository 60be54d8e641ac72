//! Progress events on the Server-Sent Events wire.
//!
//! ```text
//! data: <line>\n\n
//! event: error\ndata: <message>\n\n
//! event: file\ndata: {"filename":"…","downloadUrl":"…"}\n\n
//! event: done\ndata: completed\n\n
//! ```

use axum::response::sse::Event;
use futures_util::stream::{self, Stream};
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

use crate::download::relay::ProgressEvent;

/// SSE field values may not contain line breaks.
fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `event: file` payload; field order is part of the wire format.
#[derive(Serialize)]
struct FilePayload<'a> {
    filename: &'a str,
    #[serde(rename = "downloadUrl")]
    download_url: &'a str,
}

pub fn to_sse_event(event: &ProgressEvent) -> Event {
    match event {
        ProgressEvent::Line(line) => Event::default().data(single_line(line)),
        ProgressEvent::Failed(message) => Event::default().event("error").data(single_line(message)),
        ProgressEvent::FileReady {
            filename,
            retrieval_path,
        } => {
            let payload = FilePayload {
                filename,
                download_url: retrieval_path,
            };
            // Serializing two string fields can't fail
            let data = serde_json::to_string(&payload).unwrap_or_default();
            Event::default().event("file").data(data)
        }
        ProgressEvent::Done => Event::default().event("done").data("completed"),
    }
}

/// SSE body fed by the relay's channel.
///
/// The stream owns `guard`: once the body is dropped (client gone, or the
/// stream ran out) the guard's token fires and the relay stops.
pub fn event_stream(
    events: mpsc::Receiver<ProgressEvent>,
    guard: DropGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((events, guard), |(mut events, guard)| async move {
        let event = events.recv().await?;
        Some((Ok::<_, Infallible>(to_sse_event(&event)), (events, guard)))
    })
}
