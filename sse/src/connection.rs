use axum::response::sse::Event;
use dashmap::DashMap;
use events::{ChangeFilter, ChangeKind, Id};
use log::*;
use std::collections::HashSet;
use std::convert::Infallible;
use tokio::sync::mpsc::UnboundedSender;

/// Subjects are addressed by their auth provider user id.
pub type SubjectId = Id;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub subject_id: SubjectId,
    pub filter: ChangeFilter,
    pub sender: UnboundedSender<Result<Event, Infallible>>,
}

impl ConnectionInfo {
    /// Change events are delivered only when their kind was subscribed to.
    fn wants(&self, kind: ChangeKind) -> bool {
        self.filter.matches(kind)
    }
}

/// Connection registry with dual indices for O(1) lookups
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Secondary index: lookup by subject for message routing
    subject_index: DashMap<SubjectId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            subject_index: DashMap::new(),
        }
    }

    pub fn register(
        &self,
        subject_id: SubjectId,
        filter: ChangeFilter,
        sender: UnboundedSender<Result<Event, Infallible>>,
    ) -> ConnectionId {
        let connection_id = ConnectionId::new();

        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo {
                subject_id,
                filter,
                sender,
            },
        );

        self.subject_index
            .entry(subject_id)
            .or_default()
            .insert(connection_id.clone());

        connection_id
    }

    pub fn unregister(&self, connection_id: &ConnectionId) {
        if let Some((_, info)) = self.connections.remove(connection_id) {
            let subject_id = info.subject_id;

            if let Some(mut entry) = self.subject_index.get_mut(&subject_id) {
                entry.remove(connection_id);

                if entry.is_empty() {
                    drop(entry); // Release lock before removal
                    self.subject_index.remove(&subject_id);
                }
            }
        }
    }

    /// Send to every connection of `subject_id` whose filter accepts `kind`.
    /// Returns how many connections the event was handed to.
    pub fn send_to_subject(
        &self,
        subject_id: &SubjectId,
        kind: ChangeKind,
        event: Event,
    ) -> usize {
        let mut delivered = 0;
        if let Some(connection_ids) = self.subject_index.get(subject_id) {
            for conn_id in connection_ids.iter() {
                if let Some(info) = self.connections.get(conn_id) {
                    if !info.wants(kind) {
                        continue;
                    }
                    match info.sender.send(Ok(event.clone())) {
                        Ok(()) => delivered += 1,
                        Err(e) => warn!(
                            "Failed to send event to connection {}: {}. Connection will be cleaned up.",
                            conn_id.as_str(),
                            e
                        ),
                    }
                }
            }
        }
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn subject_connection_count(&self, subject_id: &SubjectId) -> usize {
        self.subject_index
            .get(subject_id)
            .map_or(0, |connections| connections.len())
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
