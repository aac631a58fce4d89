use crate::config::Config;
use crate::debug_if_enabled;
use crate::events::{Frame, SwipeDirection};
use crate::services::{ContactTracker, DispatchGate, GestureClassifier};
use std::sync::Arc;
use tracing::info;

/// Синхронный конвейер: кадр -> трекер -> классификатор -> гейт.
/// Вызывается из контекста, который доставляет кадры, и никогда не блокируется.
pub struct GesturePipeline {
    tracker: ContactTracker,
    classifier: GestureClassifier,
    gate: Arc<DispatchGate>,
}

impl GesturePipeline {
    pub fn new(config: &Config, gate: Arc<DispatchGate>) -> Self {
        Self {
            tracker: ContactTracker::new(&config.input),
            classifier: GestureClassifier::new(config.gesture.clone()),
            gate,
        }
    }

    /// Обработать кадр. Возвращает направление, если обработчик был поставлен в очередь.
    pub fn process_frame(&mut self, frame: &Frame) -> Option<SwipeDirection> {
        let events = self.tracker.update(frame);

        let mut recognized = None;
        for event in &events {
            debug_if_enabled!("Палец: {}", event);
            if let Some(direction) = self.classifier.handle(event) {
                recognized = Some(direction);
            }
        }
        self.classifier.tick(frame.timestamp);

        let direction = recognized?;
        if self.gate.try_dispatch(direction) {
            info!("swipe {}", direction);
            Some(direction)
        } else {
            None
        }
    }

    /// Потеря синхронизации с устройством: незавершённые группы отбрасываются без запуска
    pub fn reset(&mut self) {
        debug_if_enabled!(
            "Сброс конвейера ({} пальцев в трекере)",
            self.tracker.live_count()
        );
        self.tracker.clear();
        self.classifier.reset();
    }

    #[allow(dead_code)]
    pub fn gate(&self) -> &Arc<DispatchGate> {
        &self.gate
    }
}
