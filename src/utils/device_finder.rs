use crate::error::{Result, SwipeError};
use evdev::raw_stream::RawDevice;
use evdev::{AbsoluteAxisCode, KeyCode};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct DeviceFinder;

impl DeviceFinder {
    /// Найти мультитач тачпады: указанный явно или все подходящие при "auto"
    pub fn find_touchpad_devices(device_path: &str) -> Result<Vec<PathBuf>> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            return if path.exists() {
                info!("Используется указанное устройство: {:?}", path);
                Ok(vec![path])
            } else {
                SwipeError::device_not_found(format!(
                    "Указанное устройство не найдено: {:?}",
                    path
                ))
            };
        }

        // Автопоиск тачпада
        Self::auto_find_touchpads(Path::new("/dev/input"))
    }

    fn auto_find_touchpads(input_dir: &Path) -> Result<Vec<PathBuf>> {
        info!("Начинаем автопоиск мультитач тачпада в {}...", input_dir.display());

        let entries =
            fs::read_dir(input_dir).map_err(|e| SwipeError::input_permission(input_dir.display(), e))?;

        let mut event_devices = Vec::new();

        for entry in entries {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

            if name.starts_with("event") {
                event_devices.push(path);
            }
        }

        // Сортируем устройства по номеру
        event_devices.sort();

        let mut found = Vec::new();
        let mut denied = Vec::new();

        for device_path in event_devices {
            debug!("Проверяем устройство: {:?}", device_path);

            match RawDevice::open(&device_path) {
                Ok(device) => {
                    if Self::is_touchpad(&device) {
                        info!(
                            "Найден тачпад {:?} ({})",
                            device_path,
                            device.name().unwrap_or("Unknown")
                        );
                        found.push(device_path);
                    }
                }
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    debug!("Нет доступа к {:?}: {}", device_path, e);
                    denied.push(device_path);
                }
                Err(e) => {
                    debug!("Не удалось открыть устройство {:?}: {}", device_path, e);
                }
            }
        }

        if !found.is_empty() {
            if !denied.is_empty() {
                warn!("{} устройств пропущено из-за прав доступа", denied.len());
            }
            return Ok(found);
        }

        if let Some(first) = denied.first() {
            warn!("{} устройств недоступны по правам", denied.len());
            return Err(SwipeError::input_permission(first.display(), "Permission denied"));
        }

        SwipeError::device_not_found(
            "Не найден тачпад с поддержкой мультитача и трёх пальцев. \
             Укажите input.device_path вручную",
        )
    }

    /// Тачпад должен сообщать координаты слотов протокола B и уметь считать три пальца
    fn is_touchpad(device: &RawDevice) -> bool {
        let has_mt_axes = device.supported_absolute_axes().is_some_and(|axes| {
            axes.contains(AbsoluteAxisCode::ABS_MT_SLOT)
                && axes.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
                && axes.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
                && axes.contains(AbsoluteAxisCode::ABS_MT_TRACKING_ID)
        });

        let has_triple_tap = device
            .supported_keys()
            .is_some_and(|keys| keys.contains(KeyCode::BTN_TOOL_TRIPLETAP));

        if has_mt_axes && !has_triple_tap {
            debug!(
                "Устройство {} поддерживает мультитач, но не сообщает о трёх пальцах",
                device.name().unwrap_or("Unknown")
            );
        }

        has_mt_axes && has_triple_tap
    }
}
