use crate::config::Config;
use crate::error::{Result, SwipeError};
use crate::events::SwipeDirection;
use crate::services::{DispatchGate, GesturePipeline};
use crate::swipe_error;
use crate::utils::DeviceFinder;
use evdev::raw_stream::RawDevice;
use evdev::{AbsoluteAxisCode, InputEvent};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::mt_decoder::{AxisRange, Decoded, MtFrameDecoder, MtInput};
use super::r#trait::TrackpadListenerTrait;

/// Декодер и конвейер одного устройства
struct DeviceSession {
    decoder: MtFrameDecoder,
    pipeline: GesturePipeline,
}

impl DeviceSession {
    /// Возвращает true, если устройство сообщило о потере событий
    fn handle_event(&mut self, event: &InputEvent) -> (Option<SwipeDirection>, bool) {
        let timestamp = event
            .timestamp()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.handle_input(MtInput::from_event(event), timestamp)
    }

    fn handle_input(
        &mut self,
        input: MtInput,
        timestamp: Duration,
    ) -> (Option<SwipeDirection>, bool) {
        match self.decoder.feed(input, timestamp) {
            Some(Decoded::Frame(frame)) => (self.pipeline.process_frame(&frame), false),
            Some(Decoded::Reset) => {
                warn!("Синхронизация с устройством потеряна, незавершённые жесты отброшены");
                self.pipeline.reset();
                (None, true)
            }
            None => (None, false),
        }
    }
}

/// Читатель одного тачпада; работает в собственном потоке
struct TrackpadReader {
    device: RawDevice,
    device_path: PathBuf,
    session: DeviceSession,
}

impl TrackpadReader {
    fn open(device_path: PathBuf, config: &Config, gate: Arc<DispatchGate>) -> Result<Self> {
        let device = RawDevice::open(&device_path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                SwipeError::input_permission(device_path.display(), &e)
            }
            _ => swipe_error!(
                device_not_found,
                "Не удалось открыть устройство {:?}: {}",
                device_path,
                e
            ),
        })?;

        let decoder = Self::build_decoder(&device)?;
        Self::log_device(&device, &device_path);

        // Устройство не захватывается: курсор и жесты системы продолжают работать
        Ok(Self {
            device,
            device_path,
            session: DeviceSession {
                decoder,
                pipeline: GesturePipeline::new(config, gate),
            },
        })
    }

    fn build_decoder(device: &RawDevice) -> Result<MtFrameDecoder> {
        let mut x_range = None;
        let mut y_range = None;
        let mut pressure_range = None;
        let mut slot_count = None;

        for (axis, info) in device.get_absinfo()? {
            let range = AxisRange::new(info.minimum(), info.maximum());
            match axis {
                AbsoluteAxisCode::ABS_MT_POSITION_X => x_range = Some(range),
                AbsoluteAxisCode::ABS_MT_POSITION_Y => y_range = Some(range),
                AbsoluteAxisCode::ABS_MT_PRESSURE => pressure_range = Some(range),
                AbsoluteAxisCode::ABS_MT_SLOT => {
                    slot_count = usize::try_from(info.maximum()).ok().map(|max| max + 1)
                }
                _ => {}
            }
        }

        let (Some(x_range), Some(y_range)) = (x_range, y_range) else {
            return SwipeError::device_not_found(
                "устройство не сообщает диапазоны ABS_MT_POSITION_X/Y",
            );
        };

        info!(
            "Диапазоны: x={}..{}, y={}..{}, слотов: {:?}, давление: {}",
            x_range.min,
            x_range.max,
            y_range.min,
            y_range.max,
            slot_count,
            if pressure_range.is_some() { "есть" } else { "нет" }
        );

        Ok(MtFrameDecoder::new(slot_count, x_range, y_range, pressure_range))
    }

    /// Сырой поток: SYN_DROPPED доходит до декодера, а не поглощается evdev
    fn read_loop(mut self) -> Result<()> {
        loop {
            let events = match self.device.fetch_events() {
                Ok(events) => events.collect::<Vec<_>>(),
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                    continue
                }
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    error!("Потерян доступ к {}: {}", self.device_path.display(), e);
                    return Err(SwipeError::input_permission(self.device_path.display(), e));
                }
                Err(e) => {
                    error!("Ошибка чтения событий {}: {}", self.device_path.display(), e);
                    return Err(SwipeError::Io(e));
                }
            };

            for event in &events {
                let (_, desynced) = self.session.handle_event(event);
                if desynced {
                    self.resync_slot();
                }
            }
        }
    }

    /// После потери событий текущий слот запрашивается у ядра
    fn resync_slot(&mut self) {
        match self.device.get_abs_state() {
            Ok(state) => {
                let slot = state[AbsoluteAxisCode::ABS_MT_SLOT.0 as usize].value;
                self.session.decoder.resync_slot(slot);
            }
            Err(e) => warn!(
                "Не удалось запросить текущий слот {}: {}",
                self.device_path.display(),
                e
            ),
        }
    }

    fn log_device(device: &RawDevice, device_path: &Path) {
        info!("Тачпад: {}", device.name().unwrap_or("Unknown"));
        info!("Путь: {}", device_path.display());
        info!("Физический путь: {:?}", device.physical_path());
    }
}

impl Drop for TrackpadReader {
    fn drop(&mut self) {
        info!("Закрытие устройства {}", self.device_path.display());
    }
}

/// Все найденные тачпады; у каждого свой конвейер, гейт общий
pub struct RealTrackpadListener {
    readers: Vec<TrackpadReader>,
}

impl RealTrackpadListener {
    pub fn new(config: Arc<Config>, gate: Arc<DispatchGate>) -> Result<Self> {
        info!("Инициализация RealTrackpadListener");

        let readers = DeviceFinder::find_touchpad_devices(&config.input.device_path)?
            .into_iter()
            .map(|path| TrackpadReader::open(path, &config, gate.clone()))
            .collect::<Result<Vec<_>>>()?;

        info!("Открыто тачпадов: {}", readers.len());
        Ok(Self { readers })
    }

    async fn run_impl(self) -> Result<()> {
        info!("RealTrackpadListener запущен, начинаем чтение событий");

        // Чтение блокирующее: по потоку на устройство, первый результат завершает слушатель
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        for (index, reader) in self.readers.into_iter().enumerate() {
            let done_tx = done_tx.clone();
            std::thread::Builder::new()
                .name(format!("trackpad-reader-{}", index))
                .spawn(move || {
                    let result = reader.read_loop();
                    let _ = done_tx.send(result);
                })?;
        }
        drop(done_tx);

        done_rx
            .recv()
            .await
            .ok_or_else(|| swipe_error!(internal, "потоки чтения тачпада завершились без результата"))?
    }
}

#[async_trait::async_trait]
impl TrackpadListenerTrait for RealTrackpadListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
