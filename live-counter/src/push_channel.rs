//! Client end of the live change feed.

use crate::error::Error;
use async_trait::async_trait;
use eventsource_client::{self as es, Client};
use events::{ChangeEvent, ChangeFilter, MessageRow};
use futures_util::stream::StreamExt;
use log::*;
use serde::Deserialize;
use tokio::sync::mpsc;

pub const SSE_PATH: &str = "/api/sse";

#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self, filter: &ChangeFilter) -> Result<Subscription, Error>;
}

/// A live subscription to the change feed.
///
/// Releasing it runs the channel's unsubscribe hook exactly once, either
/// through `unsubscribe` or when the handle is dropped.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Next change, or `None` once the channel has closed the subscription.
    /// Cancel safe.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(on_unsubscribe) = self.on_unsubscribe.take() {
            on_unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Subscribes over Server-Sent Events to the BFF's `/api/sse` endpoint.
///
/// `subscribe` only fails on a malformed URL or cookie. Connecting happens in
/// the background: connection errors are logged and the client reconnects,
/// and the subscription closes once the stream ends for good.
pub struct SseChannel {
    base_url: String,
    session_cookie: String,
}

impl SseChannel {
    /// `session_cookie` is sent verbatim as the `Cookie` header, e.g. `id=...`.
    pub fn new(base_url: &str, session_cookie: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie: session_cookie.to_string(),
        }
    }
}

#[async_trait]
impl PushChannel for SseChannel {
    async fn subscribe(&self, filter: &ChangeFilter) -> Result<Subscription, Error> {
        let url = format!("{}{SSE_PATH}?kinds={}", self.base_url, filter.to_query());
        let (tx, rx) = mpsc::unbounded_channel();

        let client = es::ClientBuilder::for_url(&url)?
            .header("Cookie", &self.session_cookie)?
            .build();

        debug!("Opening SSE subscription at {url}");

        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        match parse_change_event(&event.event_type, &event.data) {
                            Ok(Some(change)) => {
                                if tx.send(change).is_err() {
                                    debug!("SSE receiver dropped, closing subscription");
                                    break;
                                }
                            }
                            Ok(None) => trace!("Ignoring SSE event {}", event.event_type),
                            Err(e) => warn!("Malformed {} event: {e}", event.event_type),
                        }
                    }
                    Some(Ok(_)) => {
                        // Comments (keep-alive) and connection notices
                    }
                    Some(Err(e)) => {
                        warn!("SSE error: {e}");
                    }
                    None => {
                        debug!("SSE stream ended");
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new(rx, move || handle.abort()))
    }
}

#[derive(Deserialize)]
struct SseEnvelope {
    data: MessagePayload,
}

#[derive(Deserialize)]
struct MessagePayload {
    message: MessageRow,
}

/// Maps one SSE frame from the BFF onto a change event. Frames that are not
/// message changes yield `None`.
pub(crate) fn parse_change_event(
    event_type: &str,
    data: &str,
) -> Result<Option<ChangeEvent>, serde_json::Error> {
    let wrap: fn(MessageRow) -> ChangeEvent = match event_type {
        "message_inserted" => ChangeEvent::Inserted,
        "message_updated" => ChangeEvent::Updated,
        _ => return Ok(None),
    };

    let envelope: SseEnvelope = serde_json::from_str(data)?;
    Ok(Some(wrap(envelope.data.message)))
}
