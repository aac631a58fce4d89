use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwipeError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl SwipeError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(SwipeError::DeviceNotFound(msg.into()))
    }

    /// Ошибка прав доступа к устройствам ввода с готовой инструкцией для пользователя
    pub fn input_permission(path: impl std::fmt::Display, cause: impl std::fmt::Display) -> Self {
        SwipeError::Permission(format!(
            "нет доступа к {}: {}. Добавьте пользователя в группу 'input' \
             (sudo usermod -a -G input $USER) и перезайдите в систему",
            path, cause
        ))
    }

    /// Фатальна ли ошибка для источника кадров (супервизор должен перезапустить процесс)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SwipeError::Permission(_) | SwipeError::DeviceNotFound(_) | SwipeError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SwipeError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! swipe_error {
    (device_not_found, $($arg:tt)*) => {
        $crate::error::SwipeError::DeviceNotFound(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::SwipeError::Internal(format!($($arg)*))
    };
}
