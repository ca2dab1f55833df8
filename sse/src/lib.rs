//! Server-Sent Events (SSE) infrastructure: the server end of the push channel.
//!
//! Authenticated subjects open one long-lived connection and receive the
//! row-level changes on the message store that concern them.
//!
//! # Architecture
//!
//! - **Per-subject routing**: a change is delivered to the connections of the
//!   subjects the domain layer listed on the event (receiver and sender).
//! - **Dual-index registry**: O(1) lookups for both connection management and
//!   subject-scoped routing via separate DashMap indices.
//! - **Kind filters**: each connection states which change kinds it wants
//!   (`inserted`, `updated`); system events bypass the filter.
//! - **Ephemeral messages**: a subject that is offline misses the event and
//!   reconciles with a fresh count on its next fetch.
//!
//! # Message Flow
//!
//! 1. Client opens `/api/sse?kinds=inserted,updated`
//! 2. The session gate resolves the subject; the handler registers the
//!    connection with its filter
//! 3. The database webhook reports a change; the domain layer publishes a
//!    `DomainEvent`
//! 4. `SseDomainEventHandler` turns it into an SSE message per notified subject
//! 5. The registry hands it to every matching connection of that subject
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry with dual-index architecture and type-safe ConnectionId
//! - `manager`: message serialization and routing (delegates to ConnectionRegistry)
//! - `message`: event and scope definitions
//! - `domain_event_handler`: bridge from domain events to SSE messages

pub mod connection;
pub mod domain_event_handler;
pub mod manager;
pub mod message;

pub use domain_event_handler::SseDomainEventHandler;
pub use manager::Manager;
