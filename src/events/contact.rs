use smallvec::SmallVec;
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// Точка в нормализованном пространстве поверхности тачпада
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (*self - *other).length()
    }

    pub fn scale(&self, factor: f32) -> Position {
        Position::new(self.x * factor, self.y * factor)
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Идентификатор касания (стабилен от касания до отрыва пальца)
pub type ContactId = i32;

/// Один палец в одном кадре
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub identifier: ContactId,
    pub position: Position,
    pub pressure: f32,
    pub timestamp: Duration,
}

impl Contact {
    pub fn new(identifier: ContactId, x: f32, y: f32, timestamp: Duration) -> Self {
        Self {
            identifier,
            position: Position::new(x, y),
            pressure: 1.0,
            timestamp,
        }
    }

    #[allow(dead_code)]
    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = pressure;
        self
    }
}

/// Все одновременные касания в момент выборки. Пять пальцев помещаются без аллокаций.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub timestamp: Duration,
    pub contacts: SmallVec<[Contact; 5]>,
}

impl Frame {
    pub fn new(timestamp: Duration) -> Self {
        Self {
            timestamp,
            contacts: SmallVec::new(),
        }
    }

    /// Добавить касание; время касания совпадает со временем кадра
    pub fn with_contact(mut self, identifier: ContactId, x: f32, y: f32) -> Self {
        self.contacts
            .push(Contact::new(identifier, x, y, self.timestamp));
        self
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "кадр@{}мс [", self.timestamp.as_millis())?;
        for (i, contact) in self.contacts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "#{} {}", contact.identifier, contact.position)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_arithmetic() {
        let a = Position::new(0.5, 0.5);
        let b = Position::new(0.8, 0.1);
        let d = b - a;
        assert!((d.x - 0.3).abs() < 1e-6);
        assert!((d.y + 0.4).abs() < 1e-6);
        assert!((d.length() - 0.5).abs() < 1e-6);
        assert!((a.distance(&b) - 0.5).abs() < 1e-6);
        assert_eq!(a + Position::ORIGIN, a);
    }

    #[test]
    fn test_frame_builder_and_display() {
        let frame = Frame::new(Duration::from_millis(20))
            .with_contact(1, 0.5, 0.5)
            .with_contact(2, 0.25, 0.75);

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.contacts[1].timestamp, Duration::from_millis(20));
        assert_eq!(
            frame.to_string(),
            "кадр@20мс [#1 (0.500, 0.500), #2 (0.250, 0.750)]"
        );
        assert!(Frame::new(Duration::ZERO).is_empty());
    }
}
