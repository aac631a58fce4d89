use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::SwipeDirection;

pub const APP_DIR: &str = "on-swipe";
pub const CONFIG_FILE: &str = "config.toml";
pub const HANDLER_FILE: &str = "handle-swipe.sh";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub gesture: GestureConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    pub device_path: String,
    /// Касания ближе этого расстояния к краю поверхности игнорируются
    pub edge_margin: f32,
    pub min_pressure: f32,
    pub max_path_len: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GestureConfig {
    pub start_window_ms: u64,
    pub end_window_ms: u64,
    pub max_start_spread: f32,
    pub divergence_threshold: f32,
    pub min_displacement: f32,
    #[serde(default)]
    pub left: Option<f32>,
    #[serde(default)]
    pub right: Option<f32>,
    #[serde(default)]
    pub up: Option<f32>,
    #[serde(default)]
    pub down: Option<f32>,
    pub two_finger_cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub script_path: Option<PathBuf>,
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
            },
            input: InputConfig {
                device_path: "auto".to_string(),
                edge_margin: 0.0,
                min_pressure: 0.0,
                max_path_len: 64,
            },
            gesture: GestureConfig::default(),
            dispatch: DispatchConfig {
                script_path: None,
                debounce_ms: 300,
            },
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            start_window_ms: 120,
            end_window_ms: 150,
            max_start_spread: 0.6,
            divergence_threshold: 1.0,
            min_displacement: 0.10,
            left: None,
            right: None,
            up: None,
            down: None,
            two_finger_cooldown_ms: 0,
        }
    }
}

impl GestureConfig {
    pub fn start_window(&self) -> Duration {
        Duration::from_millis(self.start_window_ms)
    }

    pub fn end_window(&self) -> Duration {
        Duration::from_millis(self.end_window_ms)
    }

    pub fn two_finger_cooldown(&self) -> Duration {
        Duration::from_millis(self.two_finger_cooldown_ms)
    }

    /// Минимальное среднее смещение для направления (своё значение или общий порог)
    pub fn threshold_for(&self, direction: SwipeDirection) -> f32 {
        let specific = match direction {
            SwipeDirection::Left => self.left,
            SwipeDirection::Right => self.right,
            SwipeDirection::Up => self.up,
            SwipeDirection::Down => self.down,
        };
        specific.unwrap_or(self.min_displacement)
    }
}

impl DispatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Загрузка: значения по умолчанию, затем TOML файл (если есть), затем переменные ON_SWIPE_*
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("ON_SWIPE_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        config.resolve_script_path(config_path);

        Ok(config)
    }

    /// Путь к конфигурации по умолчанию: $XDG_CONFIG_HOME/on-swipe или ~/.config/on-swipe
    pub fn default_path() -> PathBuf {
        Self::config_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    fn config_dir() -> Option<PathBuf> {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(xdg).join(APP_DIR));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join(APP_DIR))
    }

    /// Скрипт по умолчанию лежит рядом с файлом конфигурации
    fn resolve_script_path(&mut self, config_path: &Path) {
        if self.dispatch.script_path.is_none() {
            let dir = config_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            self.dispatch.script_path = Some(dir.join(HANDLER_FILE));
        }
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "full" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация настроек ввода
        if !(0.0..0.5).contains(&self.input.edge_margin) {
            anyhow::bail!("input.edge_margin должно быть в диапазоне [0, 0.5)");
        }

        if self.input.min_pressure < 0.0 {
            anyhow::bail!("input.min_pressure не может быть отрицательным");
        }

        if self.input.max_path_len < 2 {
            anyhow::bail!("input.max_path_len должно быть минимум 2");
        }

        // Валидация настроек жеста
        let gesture = &self.gesture;
        if gesture.start_window_ms == 0 {
            anyhow::bail!("gesture.start_window_ms должно быть больше 0");
        }

        if gesture.end_window_ms == 0 {
            anyhow::bail!("gesture.end_window_ms должно быть больше 0");
        }

        if gesture.max_start_spread <= 0.0 {
            anyhow::bail!("gesture.max_start_spread должно быть больше 0");
        }

        if gesture.divergence_threshold <= 0.0 {
            anyhow::bail!("gesture.divergence_threshold должно быть больше 0");
        }

        if gesture.min_displacement <= 0.0 {
            anyhow::bail!("gesture.min_displacement должно быть больше 0");
        }

        for direction in SwipeDirection::ALL {
            if gesture.threshold_for(direction) <= 0.0 {
                anyhow::bail!("Порог для направления '{}' должен быть больше 0", direction);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load("absent.toml").expect("defaults should load");
            assert_eq!(config.dispatch.debounce_ms, 300);
            assert_eq!(config.gesture.start_window_ms, 120);
            assert_eq!(
                config.dispatch.script_path.as_deref(),
                Some(Path::new("./handle-swipe.sh"))
            );
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [gesture]
                min_displacement = 0.2
                up = 0.05

                [dispatch]
                script_path = "/opt/swipe.sh"
                debounce_ms = 500
                "#,
            )?;
            jail.set_env("ON_SWIPE_DISPATCH__DEBOUNCE_MS", "750");

            let config = Config::load("config.toml").expect("config should load");
            assert_eq!(config.dispatch.debounce_ms, 750);
            assert_eq!(config.gesture.threshold_for(SwipeDirection::Up), 0.05);
            assert_eq!(config.gesture.threshold_for(SwipeDirection::Left), 0.2);
            // Не указанные в файле значения остаются по умолчанию
            assert_eq!(config.gesture.end_window_ms, 150);
            assert_eq!(
                config.dispatch.script_path.as_deref(),
                Some(Path::new("/opt/swipe.sh"))
            );
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.gesture.divergence_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.edge_margin = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.gesture.down = Some(-0.1);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[gesture]\nstart_window_ms = 0\n")?;
            assert!(Config::load("config.toml").is_err());
            Ok(())
        });
    }
}
