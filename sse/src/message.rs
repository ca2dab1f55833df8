use events::{ChangeKind, Id, MessageRow};
use serde::Serialize;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    #[serde(rename = "message_inserted")]
    MessageInserted { message: MessageRow },
    #[serde(rename = "message_updated")]
    MessageUpdated { message: MessageRow },
}

impl Event {
    /// The change kind a subscriber filter is matched against.
    pub fn change_kind(&self) -> ChangeKind {
        match self {
            Event::MessageInserted { .. } => ChangeKind::Inserted,
            Event::MessageUpdated { .. } => ChangeKind::Updated,
        }
    }
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::MessageInserted { .. } => "message_inserted",
            Event::MessageUpdated { .. } => "message_updated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub event: Event,
    pub scope: MessageScope,
}

#[derive(Debug, Clone)]
pub enum MessageScope {
    /// Send to all connections for a specific subject
    Subject { subject_id: Id },
}
