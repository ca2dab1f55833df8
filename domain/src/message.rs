//! Unread message counts as served to the live counter.

use crate::error::Error;
use crate::Id;
use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};

/// Authoritative count-fetch capability. Idempotent and safe to call repeatedly.
#[async_trait]
pub trait UnreadCountStore: Send + Sync {
    async fn count_unread(&self, subject_id: Id) -> Result<u64, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: u64,
}

/// Fetches the current unread count for `subject_id`.
pub async fn unread_count(store: &dyn UnreadCountStore, subject_id: Id) -> Result<UnreadCount, Error> {
    let count = store.count_unread(subject_id).await?;
    trace!("Subject {subject_id} has {count} unread message(s)");
    Ok(UnreadCount { count })
}
