use crate::message::{Event as SseEvent, Message as SseMessage, MessageScope};
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler, Id};
use log::*;
use std::sync::Arc;

/// Handles domain events by converting them to SSE messages and sending them
/// to the subjects listed in the event.
///
/// The domain layer decides who is notified (receiver and sender of a message
/// row); this handler only routes.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }

    fn send_to_subjects(&self, sse_event: SseEvent, subject_ids: &[Id]) {
        let mut delivered = 0;
        for subject_id in subject_ids {
            delivered += self.sse_manager.send_message(SseMessage {
                event: sse_event.clone(),
                scope: MessageScope::Subject {
                    subject_id: *subject_id,
                },
            });
        }

        debug!(
            "Sent SSE event to {} connection(s) across {} subject(s)",
            delivered,
            subject_ids.len()
        );
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::MessageInserted {
                message,
                notify_user_ids,
            } => {
                debug!("Handling MessageInserted event for message {}", message.id);
                self.send_to_subjects(
                    SseEvent::MessageInserted {
                        message: message.clone(),
                    },
                    notify_user_ids,
                );
            }

            DomainEvent::MessageUpdated {
                message,
                notify_user_ids,
            } => {
                debug!("Handling MessageUpdated event for message {}", message.id);
                self.send_to_subjects(
                    SseEvent::MessageUpdated {
                        message: message.clone(),
                    },
                    notify_user_ids,
                );
            }
        }
    }
}
