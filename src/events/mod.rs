pub mod contact;
pub mod finger;
pub mod swipe;

pub use contact::{Contact, ContactId, Frame, Position};
pub use finger::FingerEvent;
pub use swipe::SwipeDirection;

/// Запрос на запуск обработчика для распознанного свайпа
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub direction: SwipeDirection,
    pub timestamp: std::time::Instant,
}

impl DispatchRequest {
    pub fn new(direction: SwipeDirection, timestamp: std::time::Instant) -> Self {
        Self {
            direction,
            timestamp,
        }
    }
}
