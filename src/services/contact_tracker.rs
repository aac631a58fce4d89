use crate::config::InputConfig;
use crate::events::{Contact, ContactId, FingerEvent, Frame, Position};
use crate::{debug_if_enabled, trace_if_enabled};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::time::Duration;

pub type FingerEvents = SmallVec<[FingerEvent; 5]>;

/// Живой палец, которого ведёт трекер
#[derive(Debug, Clone)]
pub struct TrackedFinger {
    pub identifier: ContactId,
    pub first_seen: Duration,
    pub last_seen: Duration,
    pub origin: Position,
    pub last_position: Position,
    /// Ограниченная история позиций, старые точки вытесняются
    pub path: VecDeque<Position>,
}

impl TrackedFinger {
    fn new(contact: &Contact) -> Self {
        let mut path = VecDeque::new();
        path.push_back(contact.position);
        Self {
            identifier: contact.identifier,
            first_seen: contact.timestamp,
            last_seen: contact.timestamp,
            origin: contact.position,
            last_position: contact.position,
            path,
        }
    }

    pub fn displacement(&self) -> Position {
        self.last_position - self.origin
    }
}

/// Сопоставляет касания нового кадра с уже известными пальцами по идентификатору
/// и выдаёт события start/move/end. Без блокировок и ввода-вывода.
pub struct ContactTracker {
    fingers: SmallVec<[TrackedFinger; 5]>,
    edge_margin: f32,
    min_pressure: f32,
    max_path_len: usize,
}

impl ContactTracker {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            fingers: SmallVec::new(),
            edge_margin: config.edge_margin,
            min_pressure: config.min_pressure,
            max_path_len: config.max_path_len.max(2),
        }
    }

    /// Обработать очередной кадр. Вызывается строго по порядку кадров.
    pub fn update(&mut self, frame: &Frame) -> FingerEvents {
        let mut events = FingerEvents::new();
        if frame.is_empty() && self.fingers.is_empty() {
            return events;
        }
        let mut present: SmallVec<[&Contact; 5]> = SmallVec::new();

        for contact in &frame.contacts {
            if !self.accepts(contact) {
                trace_if_enabled!("Касание #{} отфильтровано", contact.identifier);
                continue;
            }
            if present.iter().any(|c| c.identifier == contact.identifier) {
                debug_if_enabled!(
                    "Дубликат идентификатора #{} в кадре @{}мс - касание отброшено",
                    contact.identifier,
                    frame.timestamp.as_millis()
                );
                continue;
            }
            present.push(contact);
        }

        // Сначала пальцы, пропавшие из кадра
        let mut index = 0;
        while index < self.fingers.len() {
            let id = self.fingers[index].identifier;
            if present.iter().any(|c| c.identifier == id) {
                index += 1;
                continue;
            }
            let finger = self.fingers.remove(index);
            debug_if_enabled!(
                "Палец #{} поднят: смещение {} за {}мс",
                id,
                finger.displacement(),
                finger.last_seen.saturating_sub(finger.first_seen).as_millis()
            );
            events.push(FingerEvent::Ended {
                id,
                position: finger.last_position,
                timestamp: frame.timestamp,
            });
        }

        for contact in present {
            match self
                .fingers
                .iter_mut()
                .find(|f| f.identifier == contact.identifier)
            {
                Some(finger) => {
                    finger.last_seen = contact.timestamp;
                    // Повтор той же позиции не несёт новой информации
                    if finger.last_position == contact.position {
                        continue;
                    }
                    finger.last_position = contact.position;
                    if finger.path.len() == self.max_path_len {
                        finger.path.pop_front();
                    }
                    finger.path.push_back(contact.position);
                    events.push(FingerEvent::Moved {
                        id: contact.identifier,
                        position: contact.position,
                        timestamp: contact.timestamp,
                    });
                }
                None => {
                    self.fingers.push(TrackedFinger::new(contact));
                    events.push(FingerEvent::Started {
                        id: contact.identifier,
                        position: contact.position,
                        timestamp: contact.timestamp,
                    });
                }
            }
        }

        events
    }

    fn accepts(&self, contact: &Contact) -> bool {
        if contact.pressure < self.min_pressure {
            return false;
        }

        let margin = self.edge_margin;
        if margin > 0.0 {
            let Position { x, y } = contact.position;
            if x < margin || x > 1.0 - margin || y < margin || y > 1.0 - margin {
                return false;
            }
        }

        true
    }

    #[allow(dead_code)]
    pub fn finger(&self, id: ContactId) -> Option<&TrackedFinger> {
        self.fingers.iter().find(|f| f.identifier == id)
    }

    pub fn live_count(&self) -> usize {
        self.fingers.len()
    }

    /// Забыть всех пальцев без событий (потеря синхронизации или остановка)
    pub fn clear(&mut self) {
        self.fingers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn tracker() -> ContactTracker {
        ContactTracker::new(&Config::default().input)
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_start_move_end_lifecycle() {
        let mut tracker = tracker();

        let events = tracker.update(&Frame::new(ms(0)).with_contact(1, 0.5, 0.5));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], FingerEvent::Started { id: 1, .. }));

        let events = tracker.update(&Frame::new(ms(10)).with_contact(1, 0.6, 0.5));
        assert!(matches!(events[0], FingerEvent::Moved { id: 1, .. }));
        let finger = tracker.finger(1).unwrap();
        assert_eq!(finger.path.len(), 2);
        assert!((finger.displacement().x - 0.1).abs() < 1e-6);

        let events = tracker.update(&Frame::new(ms(20)));
        assert_eq!(events.len(), 1);
        match events[0] {
            FingerEvent::Ended { id, position, timestamp } => {
                assert_eq!(id, 1);
                assert_eq!(position, Position::new(0.6, 0.5));
                assert_eq!(timestamp, ms(20));
            }
            other => panic!("ожидалось Ended, получено {:?}", other),
        }
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn test_replayed_frame_only_updates_timestamps() {
        let mut tracker = tracker();
        let frame = Frame::new(ms(0))
            .with_contact(1, 0.4, 0.5)
            .with_contact(2, 0.5, 0.5);
        tracker.update(&frame);

        let mut replay = frame.clone();
        replay.timestamp = ms(8);
        for contact in replay.contacts.iter_mut() {
            contact.timestamp = ms(8);
        }
        let events = tracker.update(&replay);

        assert!(events.is_empty());
        let finger = tracker.finger(2).unwrap();
        assert_eq!(finger.path.len(), 1);
        assert_eq!(finger.first_seen, ms(0));
        assert_eq!(finger.last_seen, ms(8));
    }

    #[test]
    fn test_duplicate_identifier_is_dropped() {
        let mut tracker = tracker();
        let frame = Frame::new(ms(0))
            .with_contact(7, 0.3, 0.3)
            .with_contact(7, 0.9, 0.9);

        let events = tracker.update(&frame);
        assert_eq!(events.len(), 1);
        assert_eq!(tracker.finger(7).unwrap().origin, Position::new(0.3, 0.3));
    }

    #[test]
    fn test_filtered_contacts_are_absent() {
        let mut config = Config::default().input;
        config.edge_margin = 0.1;
        config.min_pressure = 0.2;
        let mut tracker = ContactTracker::new(&config);

        let mut frame = Frame::new(ms(0))
            .with_contact(1, 0.05, 0.5)
            .with_contact(2, 0.5, 0.5)
            .with_contact(3, 0.5, 0.5);
        frame.contacts[2].pressure = 0.1;

        let events = tracker.update(&frame);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id(), 2);

        // Палец, ушедший в краевую зону, считается поднятым
        let events = tracker.update(&Frame::new(ms(10)).with_contact(2, 0.95, 0.5));
        assert!(matches!(events[0], FingerEvent::Ended { id: 2, .. }));
    }

    #[test]
    fn test_path_is_bounded() {
        let mut config = Config::default().input;
        config.max_path_len = 4;
        let mut tracker = ContactTracker::new(&config);

        for step in 0..10u64 {
            let frame = Frame::new(ms(step * 10)).with_contact(1, 0.1 + step as f32 * 0.05, 0.5);
            tracker.update(&frame);
        }

        let finger = tracker.finger(1).unwrap();
        assert_eq!(finger.path.len(), 4);
        assert_eq!(finger.origin, Position::new(0.1, 0.5));
        assert_eq!(finger.path.back().copied(), Some(finger.last_position));
    }
}
