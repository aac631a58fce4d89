use crate::config::DispatchConfig;
use crate::debug_if_enabled;
use crate::events::DispatchRequest;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Итог работы воркера (для логов при завершении и тестов)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InvokerStats {
    pub received: usize,
    pub spawned: usize,
    pub spawn_failed: usize,
    pub exit_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildOutcome {
    Success,
    Failed,
}

/// Воркер, который запускает скрипт-обработчик вне пути обработки кадров.
/// Ошибки запуска и ненулевые коды выхода только логируются, повторов нет.
pub struct HandlerInvoker {
    script_path: Option<PathBuf>,
    receiver: mpsc::UnboundedReceiver<DispatchRequest>,
    dry_run: bool,
}

impl HandlerInvoker {
    pub fn new(
        config: &DispatchConfig,
        receiver: mpsc::UnboundedReceiver<DispatchRequest>,
        dry_run: bool,
    ) -> Self {
        info!("Инициализация HandlerInvoker (dry_run: {})", dry_run);

        let script_path = match config.script_path.as_deref() {
            Some(path) if path.exists() => {
                info!("Скрипт-обработчик найден: {}", path.display());
                Some(path.to_path_buf())
            }
            Some(path) => {
                info!(
                    "Скрипт {} не найден - свайпы будут только логироваться",
                    path.display()
                );
                None
            }
            None => {
                info!("Скрипт-обработчик не настроен - свайпы будут только логироваться");
                None
            }
        };

        Self {
            script_path,
            receiver,
            dry_run,
        }
    }

    #[allow(dead_code)]
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    /// Обрабатывать запросы, пока канал открыт; затем дождаться всех запущенных процессов
    pub async fn run(mut self) -> InvokerStats {
        info!("HandlerInvoker запущен");

        let mut stats = InvokerStats::default();
        let mut children: JoinSet<ChildOutcome> = JoinSet::new();

        while let Some(request) = self.receiver.recv().await {
            stats.received += 1;
            self.invoke(&request, &mut children, &mut stats);

            // Забираем уже завершившиеся процессы, чтобы набор не рос
            while let Some(outcome) = children.try_join_next() {
                Self::record_outcome(outcome, &mut stats);
            }
        }

        while let Some(outcome) = children.join_next().await {
            Self::record_outcome(outcome, &mut stats);
        }

        info!(
            "HandlerInvoker завершён: получено {}, запущено {}, ошибок запуска {}, ошибок выполнения {}",
            stats.received, stats.spawned, stats.spawn_failed, stats.exit_failed
        );
        stats
    }

    fn invoke(
        &self,
        request: &DispatchRequest,
        children: &mut JoinSet<ChildOutcome>,
        stats: &mut InvokerStats,
    ) {
        let direction = request.direction.as_arg();

        let Some(script) = self.script_path.as_ref() else {
            info!("swipe {}", direction);
            return;
        };

        if self.dry_run {
            info!("[DRY RUN] {} {}", script.display(), direction);
            return;
        }

        debug_if_enabled!(
            "Запуск: {} {} (задержка {}мс)",
            script.display(),
            direction,
            request.timestamp.elapsed().as_millis()
        );

        let spawned = Command::new(script)
            .arg(direction)
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .spawn();

        match spawned {
            Ok(mut child) => {
                stats.spawned += 1;
                let script = script.display().to_string();
                children.spawn(async move {
                    match child.wait().await {
                        Ok(status) if status.success() => {
                            debug_if_enabled!("Скрипт {} {} завершился успешно", script, direction);
                            ChildOutcome::Success
                        }
                        Ok(status) => {
                            warn!("Скрипт {} {} завершился с {}", script, direction, status);
                            ChildOutcome::Failed
                        }
                        Err(e) => {
                            error!("Не удалось дождаться скрипта {}: {}", script, e);
                            ChildOutcome::Failed
                        }
                    }
                });
            }
            Err(e) => {
                stats.spawn_failed += 1;
                error!("Не удалось запустить скрипт '{}': {}", script.display(), e);
            }
        }
    }

    fn record_outcome(
        outcome: Result<ChildOutcome, tokio::task::JoinError>,
        stats: &mut InvokerStats,
    ) {
        match outcome {
            Ok(ChildOutcome::Success) => {}
            Ok(ChildOutcome::Failed) => stats.exit_failed += 1,
            Err(e) => {
                stats.exit_failed += 1;
                error!("Задача ожидания скрипта прервана: {}", e);
            }
        }
    }
}
