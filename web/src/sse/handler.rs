use crate::error::{Error, WebErrorKind};
use crate::extractors::current_subject::CurrentSubject;
use crate::AppState;
use ::sse::connection::ConnectionId;
use ::sse::Manager;
use async_stream::stream;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use events::ChangeFilter;
use futures::Stream;
use log::*;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SseParams {
    /// Comma separated change kinds, e.g. `inserted,updated`. Absent or empty
    /// means every kind.
    kinds: Option<String>,
}

/// SSE handler that establishes a long-lived connection for message changes.
/// One connection per mounted live counter; several may exist per subject.
pub(crate) async fn sse_handler(
    CurrentSubject(subject_id): CurrentSubject,
    State(app_state): State<AppState>,
    Query(params): Query<SseParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let filter = ChangeFilter::parse_list(params.kinds.as_deref().unwrap_or_default()).map_err(
        |e| {
            warn!("Rejected SSE subscription with bad kinds filter: {e}");
            Error::Web(WebErrorKind::Input)
        },
    )?;

    debug!("Establishing SSE connection for subject {subject_id} with filter {filter:?}");

    let (tx, mut rx) = mpsc::unbounded_channel();

    let connection_id = app_state
        .sse_manager
        .register_connection(subject_id, filter, tx);

    let guard = ConnectionGuard {
        manager: app_state.sse_manager.clone(),
        connection_id,
        subject_id,
    };

    let stream = stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Unregisters the connection when the response stream is dropped, which is
/// how axum reports a client that went away.
struct ConnectionGuard {
    manager: Arc<Manager>,
    connection_id: ConnectionId,
    subject_id: domain::Id,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!(
            "SSE connection closed for subject {}, cleaning up",
            self.subject_id
        );
        self.manager.unregister_connection(&self.connection_id);
    }
}
