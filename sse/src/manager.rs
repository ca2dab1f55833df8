use crate::connection::{ConnectionId, ConnectionRegistry, SubjectId};
use crate::message::{EventType, Message as SseMessage, MessageScope};
use axum::response::sse::Event;
use events::ChangeFilter;
use log::*;
use std::sync::Arc;

pub struct Manager {
    registry: Arc<ConnectionRegistry>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Register a new connection and return its unique ID
    pub fn register_connection(
        &self,
        subject_id: SubjectId,
        filter: ChangeFilter,
        sender: tokio::sync::mpsc::UnboundedSender<Result<Event, std::convert::Infallible>>,
    ) -> ConnectionId {
        let connection_id = self.registry.register(subject_id, filter, sender);
        info!(
            "Registered SSE connection {} for subject {}",
            connection_id.as_str(),
            subject_id
        );
        connection_id
    }

    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        info!("Unregistering SSE connection {}", connection_id.as_str());
        self.registry.unregister(connection_id);
    }

    /// Send a message based on its scope. Returns the number of connections reached.
    pub fn send_message(&self, message: SseMessage) -> usize {
        let event_type = message.event.event_type();
        let kind = message.event.change_kind();

        let event_data = match serde_json::to_string(&message.event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize SSE event: {e}");
                return 0;
            }
        };

        let event = Event::default().event(event_type).data(event_data);

        match message.scope {
            MessageScope::Subject { subject_id } => {
                self.registry.send_to_subject(&subject_id, kind, event)
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
