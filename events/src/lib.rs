//! Event system infrastructure for the social platform.
//!
//! This crate holds the message-store change types shared by the server and
//! by client crates, plus the in-process publisher that fans domain events
//! out to handlers (like SSE notifications).
//!
//! # Architecture
//!
//! - **MessageRow / ChangeEvent**: wire shape of a row-level change on the
//!   message store, as pushed to subscribers
//! - **DomainEvent**: business events raised when a change is ingested
//! - **EventHandler**: trait for implementing event handlers
//! - **EventPublisher**: publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, so both the `sse`
//! server crate and the `live-counter` client crate can depend on it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier type used for subjects (users) and rows.
pub type Id = Uuid;

/// One row of the message store, reduced to the fields change consumers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: Id,
    pub sender_id: Id,
    pub receiver_id: Id,
    #[serde(default)]
    pub read: bool,
}

/// A row-level change on the message store. Consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ChangeEvent {
    Inserted(MessageRow),
    Updated(MessageRow),
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Inserted(_) => ChangeKind::Inserted,
            ChangeEvent::Updated(_) => ChangeKind::Updated,
        }
    }

    pub fn row(&self) -> &MessageRow {
        match self {
            ChangeEvent::Inserted(row) | ChangeEvent::Updated(row) => row,
        }
    }
}

/// The kinds of change a subscriber can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Inserted => "inserted",
            ChangeKind::Updated => "updated",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ChangeKindParseError(pub String);

impl fmt::Display for ChangeKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown change kind: {}", self.0)
    }
}

impl std::error::Error for ChangeKindParseError {}

impl FromStr for ChangeKind {
    type Err = ChangeKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inserted" | "insert" => Ok(ChangeKind::Inserted),
            "updated" | "update" => Ok(ChangeKind::Updated),
            other => Err(ChangeKindParseError(other.to_string())),
        }
    }
}

/// Selects which change kinds a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    kinds: Vec<ChangeKind>,
}

impl ChangeFilter {
    pub fn new(kinds: Vec<ChangeKind>) -> Self {
        Self { kinds }
    }

    /// Inserts and updates on the message store.
    pub fn all() -> Self {
        Self::new(vec![ChangeKind::Inserted, ChangeKind::Updated])
    }

    pub fn kinds(&self) -> &[ChangeKind] {
        &self.kinds
    }

    pub fn matches(&self, kind: ChangeKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Parses a comma separated list such as `inserted,updated`.
    /// An empty string selects every kind.
    pub fn parse_list(list: &str) -> Result<Self, ChangeKindParseError> {
        let kinds = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ChangeKind::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        if kinds.is_empty() {
            Ok(Self::all())
        } else {
            Ok(Self::new(kinds))
        }
    }

    /// Renders the filter back into the query form accepted by `parse_list`.
    pub fn to_query(&self) -> String {
        self.kinds
            .iter()
            .map(ChangeKind::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for ChangeFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Domain events that represent business-level changes in the system.
/// These events are emitted when a change on the message store is ingested.
///
/// Events include user IDs for notification routing. The domain layer is
/// responsible for determining which users should be notified.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A message row was inserted. Receiver and sender are notified so their
    /// unread counters and conversation views can react.
    MessageInserted {
        message: MessageRow,
        notify_user_ids: Vec<Id>,
    },
    /// A message row changed, usually its read state.
    MessageUpdated {
        message: MessageRow,
        notify_user_ids: Vec<Id>,
    },
}

impl DomainEvent {
    pub fn change(&self) -> ChangeEvent {
        match self {
            DomainEvent::MessageInserted { message, .. } => ChangeEvent::Inserted(message.clone()),
            DomainEvent::MessageUpdated { message, .. } => ChangeEvent::Updated(message.clone()),
        }
    }

    pub fn notify_user_ids(&self) -> &[Id] {
        match self {
            DomainEvent::MessageInserted {
                notify_user_ids, ..
            }
            | DomainEvent::MessageUpdated {
                notify_user_ids, ..
            } => notify_user_ids,
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
