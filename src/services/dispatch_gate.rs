use crate::debug_if_enabled;
use crate::events::{DispatchRequest, SwipeDirection};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Общее состояние гейта: время последнего запуска и канал к воркеру
#[derive(Debug)]
struct DispatchRecord {
    last_dispatch: Option<Instant>,
    sender: Option<mpsc::UnboundedSender<DispatchRequest>>,
}

/// Пропускает не более одного запуска обработчика за период тишины.
/// Проверка и обновление `last_dispatch` выполняются под одной блокировкой.
pub struct DispatchGate {
    quiet_period: Duration,
    record: Mutex<DispatchRecord>,
}

impl DispatchGate {
    pub fn new(quiet_period: Duration, sender: mpsc::UnboundedSender<DispatchRequest>) -> Self {
        info!("Инициализация DispatchGate (период тишины: {}мс)", quiet_period.as_millis());
        Self {
            quiet_period,
            record: Mutex::new(DispatchRecord {
                last_dispatch: None,
                sender: Some(sender),
            }),
        }
    }

    /// Гейт вместе с приёмником для HandlerInvoker
    pub fn channel(quiet_period: Duration) -> (Self, mpsc::UnboundedReceiver<DispatchRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(quiet_period, sender), receiver)
    }

    pub fn try_dispatch(&self, direction: SwipeDirection) -> bool {
        self.try_dispatch_at(direction, Instant::now())
    }

    pub fn try_dispatch_at(&self, direction: SwipeDirection, now: Instant) -> bool {
        let mut record = self.record.lock();

        if let Some(last) = record.last_dispatch {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.quiet_period {
                debug_if_enabled!(
                    "Свайп {} подавлен: прошло {}мс из {}мс тишины",
                    direction,
                    elapsed.as_millis(),
                    self.quiet_period.as_millis()
                );
                return false;
            }
        }

        let Some(sender) = record.sender.as_ref() else {
            debug_if_enabled!("Гейт закрыт - свайп {} не отправлен", direction);
            return false;
        };

        // Неограниченный канал: отправка никогда не блокирует путь обработки кадров
        if sender.send(DispatchRequest::new(direction, now)).is_err() {
            warn!("Воркер обработчика остановлен - свайп {} потерян", direction);
            return false;
        }

        record.last_dispatch = Some(now);
        true
    }

    #[allow(dead_code)]
    pub fn last_dispatch(&self) -> Option<Instant> {
        self.record.lock().last_dispatch
    }

    /// Закрыть канал: воркер дообработает очередь и завершится
    pub fn close(&self) {
        if self.record.lock().sender.take().is_some() {
            info!("DispatchGate закрыт");
        }
    }
}
