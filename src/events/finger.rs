use super::contact::{ContactId, Position};
use std::fmt;
use std::time::Duration;

/// Событие жизненного цикла пальца, которое выдаёт ContactTracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FingerEvent {
    Started {
        id: ContactId,
        position: Position,
        timestamp: Duration,
    },
    Moved {
        id: ContactId,
        position: Position,
        timestamp: Duration,
    },
    Ended {
        id: ContactId,
        position: Position,
        timestamp: Duration,
    },
}

impl FingerEvent {
    #[allow(dead_code)]
    pub fn id(&self) -> ContactId {
        match self {
            FingerEvent::Started { id, .. }
            | FingerEvent::Moved { id, .. }
            | FingerEvent::Ended { id, .. } => *id,
        }
    }

    pub fn timestamp(&self) -> Duration {
        match self {
            FingerEvent::Started { timestamp, .. }
            | FingerEvent::Moved { timestamp, .. }
            | FingerEvent::Ended { timestamp, .. } => *timestamp,
        }
    }
}

impl fmt::Display for FingerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, id, position, timestamp) = match self {
            FingerEvent::Started { id, position, timestamp } => ("start", id, position, timestamp),
            FingerEvent::Moved { id, position, timestamp } => ("move", id, position, timestamp),
            FingerEvent::Ended { id, position, timestamp } => ("end", id, position, timestamp),
        };
        write!(f, "{} #{} {} @{}мс", kind, id, position, timestamp.as_millis())
    }
}
