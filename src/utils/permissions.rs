use crate::error::{Result, SwipeError};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const INPUT_DIR: &str = "/dev/input";

/// Проверить права доступа к необходимым ресурсам
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    // Проверка доступа к /dev/input/
    check_input_devices_access(Path::new(INPUT_DIR))?;

    // Проверка, что не запущен от root (рекомендация безопасности)
    check_not_root();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_devices_access(input_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        return Err(SwipeError::Permission(format!(
            "Директория {} не существует",
            input_dir.display()
        )));
    }

    // Проверяем возможность чтения директории
    match fs::read_dir(input_dir) {
        Ok(_) => {
            info!("Доступ к {} подтвержден", input_dir.display());
            Ok(())
        }
        Err(e) => Err(SwipeError::input_permission(input_dir.display(), e)),
    }
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  Приложение запущено от имени root!");
            warn!("   Скрипт-обработчик тоже будет выполняться от root");
            warn!("   Рекомендуется добавить пользователя в группу 'input'");
            warn!("   и запускать приложение от имени обычного пользователя:");
            warn!("   sudo usermod -a -G input $USER");
            warn!("   (затем перезайдите в систему)");
        }
        Ok(user) => {
            info!("Приложение запущено от имени пользователя: {}", user);
        }
        Err(_) => {
            warn!("Не удалось определить пользователя");
        }
    }
}

/// Рекомендуемые команды для настройки прав доступа (выводятся при фатальной ошибке)
pub fn get_setup_commands() -> Vec<String> {
    vec![
        "# Добавить пользователя в группу input:".to_string(),
        "sudo usermod -a -G input $USER".to_string(),
        "".to_string(),
        "# Проверить, что тачпад виден:".to_string(),
        "ls -l /dev/input/event*".to_string(),
        "".to_string(),
        "# После выполнения команд перезайдите в систему".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_commands() {
        let commands = get_setup_commands();
        assert!(!commands.is_empty());
        assert!(commands.iter().any(|cmd| cmd.contains("usermod")));
        assert!(commands.iter().any(|cmd| cmd.contains("/dev/input")));
    }

    #[test]
    fn test_missing_input_dir_is_permission_error() {
        let result = check_input_devices_access(Path::new("/non/existent/input"));
        assert!(matches!(result, Err(SwipeError::Permission(_))));
    }
}
