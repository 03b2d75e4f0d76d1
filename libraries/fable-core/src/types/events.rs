/// Listening event types - the append-only source of truth for progress
use super::{now_ms, BookId, EventId, UserId};
use serde::{Deserialize, Serialize};

/// How an event entered the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Recorded live by a playback client
    #[default]
    Playback,
    /// Converted from a foreign system during migration
    Imported,
    /// Entered by hand (e.g. "I listened to two chapters on CD")
    Manual,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playback => "playback",
            Self::Imported => "imported",
            Self::Manual => "manual",
        }
    }
}

/// Device that produced an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub client: String,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: client.into(),
        }
    }

    /// The fixed marker attached to events converted from a foreign system
    pub fn imported() -> Self {
        Self {
            name: "imported".to_string(),
            client: "migration".to_string(),
        }
    }
}

/// Immutable record of one listening span.
///
/// Once written it is never mutated or deleted by normal operation; the event
/// log is the sole source of truth for playback progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningEvent {
    /// Unique event identifier
    pub id: EventId,

    /// User who listened
    pub user_id: UserId,

    /// Book that was played
    pub book_id: BookId,

    /// Position in the book when the span started (ms)
    pub start_position_ms: i64,

    /// Position in the book when the span ended (ms)
    pub end_position_ms: i64,

    /// Time actually spent listening during this span (ms)
    pub duration_ms: i64,

    /// Wall-clock start of the span (unix ms)
    pub started_at: i64,

    /// Wall-clock end of the span (unix ms)
    pub ended_at: i64,

    /// Playback rate during the span
    pub playback_rate: f64,

    /// Device that produced the event
    pub device: DeviceInfo,

    /// How the event entered the log
    pub source: EventSource,

    /// When the record itself was written (unix ms)
    pub created_at: i64,
}

impl ListeningEvent {
    /// Create a playback event covering one span
    pub fn new(user_id: UserId, book_id: BookId, start_position_ms: i64, end_position_ms: i64) -> Self {
        let now = now_ms();
        Self {
            id: EventId::generate(),
            user_id,
            book_id,
            start_position_ms,
            end_position_ms,
            duration_ms: (end_position_ms - start_position_ms).max(0),
            started_at: now,
            ended_at: now,
            playback_rate: 1.0,
            device: DeviceInfo::new("unknown", "unknown"),
            source: EventSource::Playback,
            created_at: now,
        }
    }
}

/// One listening session as reported by a client.
///
/// Sessions are coarser than events and are kept as an append-only companion
/// stream in archives; they are not folded into progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningSession {
    pub id: String,
    pub user_id: UserId,
    pub book_id: BookId,
    pub started_at: i64,
    pub ended_at: i64,
    pub time_listened_ms: i64,
    pub updated_at: i64,
}
