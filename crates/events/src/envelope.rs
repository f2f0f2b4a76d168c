use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for a published change.
///
/// `stream` identifies the document (`collection/key`), `sequence_number` is the
/// document version produced by the commit that emitted this envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    stream: String,
    stream_type: String,

    /// Document version after the commit.
    sequence_number: u64,

    event_type: String,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        stream: impl Into<String>,
        stream_type: impl Into<String>,
        sequence_number: u64,
        event_type: impl Into<String>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            stream: stream.into(),
            stream_type: stream_type.into(),
            sequence_number,
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
