//! Server-sent-event plumbing shared by the HTTP backends.
//!
//! A provider supplies a [`ParseEvent`] that classifies each event; this
//! module turns the event stream into a stream of text fragments that ends
//! on the provider's completion marker and fails on anything else.

use super::error::BackendError;
use super::FragmentStream;
use eventsource_stream::Eventsource;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

/// One decoded SSE event: the `event:` name (may be empty) and its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// What a provider event means for the translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseStep {
    /// New generated text.
    Fragment(String),
    /// Bookkeeping event with no text.
    Skip,
    /// Provider completion marker.
    Done,
}

pub type ParseEvent = fn(event: &str, data: &str) -> Result<SseStep, BackendError>;

/// Fragments from a streaming HTTP response body.
pub fn fragments(response: reqwest::Response, parse: ParseEvent) -> FragmentStream {
    let events = response
        .bytes_stream()
        .eventsource()
        .map(|item| {
            item.map(|e| SseEvent::new(e.event, e.data))
                .map_err(|e| e.to_string())
        })
        .boxed();
    fragments_from_events(events, parse)
}

/// Fragments from already-decoded events.
///
/// Ends cleanly on [`SseStep::Done`]. A transport error, a parse error, or
/// the events running out before `Done` yields one error item, then ends.
pub fn fragments_from_events(
    events: BoxStream<'static, Result<SseEvent, String>>,
    parse: ParseEvent,
) -> FragmentStream {
    stream::unfold(Some(events), move |state| async move {
        let mut events = state?;
        loop {
            let step = match events.next().await {
                None => return Some((Err(BackendError::Truncated), None)),
                Some(Err(e)) => return Some((Err(BackendError::Stream(e)), None)),
                Some(Ok(event)) => parse(&event.event, &event.data),
            };
            match step {
                Ok(SseStep::Fragment(text)) => return Some((Ok(text), Some(events))),
                Ok(SseStep::Skip) => continue,
                Ok(SseStep::Done) => return None,
                Err(e) => return Some((Err(e), None)),
            }
        }
    })
    .boxed()
}
