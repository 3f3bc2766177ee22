//! Session event notifications
//!
//! Side effects (analytics, audit) hang off a [`EventSink`] the session
//! calls after state changes and successful persistence steps. Delivery
//! is synchronous and infallible: a sink cannot fail or veto the
//! operation that produced the event.

use crate::phase::PublishPhase;
use chrono::{DateTime, Utc};
use folio_document::{DocumentKind, FileId};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// What happened in a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SessionEvent {
    /// A document was fetched from the store and tracked.
    DocumentLoaded {
        /// Loaded document.
        id: FileId,
    },
    /// A document accumulated pending changes.
    DocumentEdited {
        /// Edited document.
        id: FileId,
        /// Whether the merged content validated.
        valid: bool,
    },
    /// Pending changes were discarded.
    ChangesCleared {
        /// Affected document.
        id: FileId,
        /// Whether the record was removed entirely (virtual discard).
        removed: bool,
    },
    /// A virtual document was allocated.
    VirtualCreated {
        /// Minted negative id.
        id: FileId,
        /// Kind of the draft.
        kind: DocumentKind,
    },
    /// The publish machine moved phases.
    PhaseChanged {
        /// Previous phase.
        from: PublishPhase,
        /// New phase.
        to: PublishPhase,
    },
    /// A publish persisted documents.
    Published {
        /// Documents created.
        created: usize,
        /// Documents saved.
        saved: usize,
    },
    /// A publish failed.
    PublishFailed {
        /// Display form of the failure.
        message: String,
    },
}

/// A session event with its dispatch context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    /// Session that emitted the event.
    pub session: Uuid,
    /// Emission time.
    pub at: DateTime<Utc>,
    /// What happened.
    pub event: SessionEvent,
}

/// Receives session events.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block.
    fn emit(&self, envelope: EventEnvelope);
}

/// Sink that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, envelope: EventEnvelope) {
        let session = envelope.session;
        match envelope.event {
            SessionEvent::DocumentLoaded { id } => {
                tracing::debug!(%session, %id, "document loaded");
            }
            SessionEvent::DocumentEdited { id, valid } => {
                tracing::debug!(%session, %id, valid, "document edited");
            }
            SessionEvent::ChangesCleared { id, removed } => {
                tracing::debug!(%session, %id, removed, "changes cleared");
            }
            SessionEvent::VirtualCreated { id, kind } => {
                tracing::debug!(%session, %id, kind = kind.as_str(), "virtual document created");
            }
            SessionEvent::PhaseChanged { from, to } => {
                tracing::debug!(%session, %from, %to, "publish phase changed");
            }
            SessionEvent::Published { created, saved } => {
                tracing::info!(%session, created, saved, "publish complete");
            }
            SessionEvent::PublishFailed { message } => {
                tracing::warn!(%session, %message, "publish failed");
            }
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _envelope: EventEnvelope) {}
}

/// Sink that records events for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    envelopes: Mutex<Vec<EventEnvelope>>,
}

impl RecordingSink {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded envelopes, in emission order.
    #[must_use]
    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.envelopes.lock().clone()
    }

    /// The bare events, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<SessionEvent> {
        self.envelopes
            .lock()
            .iter()
            .map(|envelope| envelope.event.clone())
            .collect()
    }

    /// Drain everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<EventEnvelope> {
        std::mem::take(&mut *self.envelopes.lock())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, envelope: EventEnvelope) {
        self.envelopes.lock().push(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(event: SessionEvent) -> EventEnvelope {
        EventEnvelope {
            session: Uuid::new_v4(),
            at: Utc::now(),
            event,
        }
    }

    #[test]
    fn recording_sink_keeps_emission_order() {
        let sink = RecordingSink::new();
        sink.emit(envelope(SessionEvent::DocumentLoaded {
            id: FileId::from_raw(1),
        }));
        sink.emit(envelope(SessionEvent::Published {
            created: 1,
            saved: 2,
        }));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            SessionEvent::DocumentLoaded {
                id: FileId::from_raw(1)
            }
        );
        assert_eq!(events[1], SessionEvent::Published { created: 1, saved: 2 });
    }

    #[test]
    fn take_drains_the_recorder() {
        let sink = RecordingSink::new();
        sink.emit(envelope(SessionEvent::PublishFailed {
            message: "batch create failed: transport error: down".to_string(),
        }));
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let json = serde_json::to_value(SessionEvent::PhaseChanged {
            from: PublishPhase::Idle,
            to: PublishPhase::Collecting,
        })
        .unwrap();
        assert_eq!(json["type"], "phaseChanged");
        assert_eq!(json["from"], "idle");
    }
}
