use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinError;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use error::SwipeError;
use services::{create_trackpad_listener, DispatchGate, HandlerInvoker};

#[derive(Parser, Debug)]
#[command(name = "on-swipe", version)]
#[command(about = "Демон, запускающий скрипт при свайпе тремя пальцами по тачпаду")]
struct Args {
    /// Путь к файлу конфигурации (по умолчанию ~/.config/on-swipe/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Режим сухого запуска (эмуляция свайпов, скрипт не запускается)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает значение из конфигурации)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        // Справка и версия - не рабочий запуск: код выхода ненулевой
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    // Загрузка конфигурации
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
        config.validate()?;
    }
    let config = Arc::new(config);

    // Инициализация системы логирования
    init_tracing(&config.logging.level, &config.logging.format)?;

    info!("Запуск on-swipe v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", config_path.display());

    if args.dry_run {
        warn!("Режим сухого запуска - устройство не открывается, скрипт не запускается");
    } else {
        // Проверка прав доступа
        if let Err(e) = utils::permissions::check_permissions() {
            fail(&e);
        }
    }

    // Инициализация компонентов
    let (gate, receiver) = DispatchGate::channel(config.dispatch.debounce());
    let gate = Arc::new(gate);
    let invoker = HandlerInvoker::new(&config.dispatch, receiver, args.dry_run);

    let trackpad_listener = match create_trackpad_listener(config.clone(), gate.clone(), args.dry_run) {
        Ok(listener) => listener,
        Err(e) => fail(&e),
    };

    info!("Все компоненты инициализированы");

    // Запуск сервисов
    let invoker_handle = tokio::spawn(invoker.run());
    let mut listener_handle = tokio::spawn(trackpad_listener.run());

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения или отказа источника кадров
    tokio::select! {
        result = &mut listener_handle => fail(&listener_failure(result)),
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
            }
        }
    }

    info!("Завершение работы...");

    // Новые свайпы больше не принимаются, воркер дорабатывает очередь
    gate.close();
    listener_handle.abort();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, invoker_handle).await {
        Ok(Ok(_stats)) => info!("Все сервисы завершили работу корректно"),
        Ok(Err(e)) => error!("Задача HandlerInvoker аварийно завершилась: {}", e),
        Err(_) => warn!("Таймаут при завершении HandlerInvoker"),
    }

    info!("on-swipe завершил работу");
    Ok(())
}

/// Источник кадров не завершается штатно: любой исход его задачи - отказ
fn listener_failure(result: std::result::Result<error::Result<()>, JoinError>) -> SwipeError {
    match result {
        Ok(Ok(())) => swipe_error!(internal, "TrackpadListener неожиданно завершился"),
        Ok(Err(e)) => e,
        Err(e) => swipe_error!(internal, "задача TrackpadListener аварийно завершилась: {}", e),
    }
}

/// Фатальная ошибка источника кадров: процесс завершается, перезапуск - дело супервизора
fn fail(e: &SwipeError) -> ! {
    error!("{}", e);
    if matches!(e, SwipeError::Permission(_)) {
        eprintln!("Для настройки доступа выполните:");
        for command in utils::permissions::get_setup_commands() {
            eprintln!("{}", command);
        }
    }
    if !e.is_fatal() {
        warn!("Ошибка не относится к фатальным, но продолжить работу без источника кадров нельзя");
    }
    std::process::exit(1);
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        "full" => registry.with(tracing_subscriber::fmt::layer()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panicked_listener_is_a_failure() {
        let handle = tokio::spawn(async {
            if true {
                panic!("сбой чтения");
            }
            Ok::<(), SwipeError>(())
        });
        let err = listener_failure(handle.await);
        assert!(matches!(err, SwipeError::Internal(_)));
    }

    #[tokio::test]
    async fn test_listener_error_is_passed_through() {
        let handle = tokio::spawn(async {
            Err::<(), SwipeError>(swipe_error!(device_not_found, "тачпад отключён"))
        });
        let err = listener_failure(handle.await);
        assert!(matches!(err, SwipeError::DeviceNotFound(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_listener_returning_is_a_failure() {
        assert!(matches!(listener_failure(Ok(Ok(()))), SwipeError::Internal(_)));
    }
}
