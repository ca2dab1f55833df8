//! Client-side live unread-message counter.
//!
//! A `LiveCounter` keeps an unread count for one subject by combining an
//! authoritative fetch with a subscription to the row-level change feed:
//!
//! - `Inserted` rows sent by someone else bump the count by one
//! - `Updated` rows trigger a fresh fetch that replaces the count outright
//!
//! The fetch and the feed are capabilities (`CountSource`, `PushChannel`) so
//! the counter runs against the BFF over HTTP and SSE (`HttpCountSource`,
//! `SseChannel`) or against fakes in tests.
//!
//! # Modules
//!
//! - `counter`: the `UnreadCount` reducer and the `LiveCounter` task
//! - `count_source`: authoritative count fetch
//! - `push_channel`: change feed subscription with exactly-once release
//! - `error`: fetch and subscription failures

pub mod count_source;
pub mod counter;
pub mod error;
pub mod push_channel;

pub use count_source::{CountSource, HttpCountSource};
pub use counter::{LiveCounter, UnreadCount};
pub use error::{Error, ErrorKind};
pub use events::{ChangeEvent, ChangeFilter, ChangeKind, Id, MessageRow};
pub use push_channel::{PushChannel, SseChannel, Subscription};
