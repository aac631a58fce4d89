//! Декодер мультитач протокола B (слоты evdev) в кадры касаний.

use crate::events::{Contact, Frame, Position};
use crate::trace_if_enabled;
use evdev::{AbsoluteAxisCode, EventType, InputEvent, SynchronizationCode};
use std::time::Duration;
use tracing::warn;

const DEFAULT_SLOTS: usize = 10;

/// Диапазон значений оси, сообщаемый устройством
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Привести значение к [0, 1]
    pub fn normalize(&self, value: i32) -> f32 {
        let span = (self.max - self.min) as f32;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) as f32 / span).clamp(0.0, 1.0)
    }
}

/// Интересующие декодер события устройства
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtInput {
    Slot(i32),
    TrackingId(i32),
    PositionX(i32),
    PositionY(i32),
    Pressure(i32),
    SynReport,
    SynDropped,
    Other,
}

impl MtInput {
    pub fn from_raw(event_type: EventType, code: u16, value: i32) -> Self {
        if event_type == EventType::ABSOLUTE {
            match AbsoluteAxisCode(code) {
                AbsoluteAxisCode::ABS_MT_SLOT => MtInput::Slot(value),
                AbsoluteAxisCode::ABS_MT_TRACKING_ID => MtInput::TrackingId(value),
                AbsoluteAxisCode::ABS_MT_POSITION_X => MtInput::PositionX(value),
                AbsoluteAxisCode::ABS_MT_POSITION_Y => MtInput::PositionY(value),
                AbsoluteAxisCode::ABS_MT_PRESSURE => MtInput::Pressure(value),
                _ => MtInput::Other,
            }
        } else if event_type == EventType::SYNCHRONIZATION {
            match SynchronizationCode(code) {
                SynchronizationCode::SYN_REPORT => MtInput::SynReport,
                SynchronizationCode::SYN_DROPPED => MtInput::SynDropped,
                _ => MtInput::Other,
            }
        } else {
            MtInput::Other
        }
    }

    pub fn from_event(event: &InputEvent) -> Self {
        Self::from_raw(event.event_type(), event.code(), event.value())
    }
}

/// Результат декодирования
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Frame(Frame),
    /// Ядро потеряло события: состояние слотов недостоверно
    Reset,
}

#[derive(Debug, Clone, Copy)]
struct SlotState {
    tracking_id: i32, // -1 = неактивен
    x: i32,
    y: i32,
    pressure: Option<i32>,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            tracking_id: -1,
            x: 0,
            y: 0,
            pressure: None,
        }
    }
}

pub struct MtFrameDecoder {
    slots: Vec<SlotState>,
    /// None после недопустимого ABS_MT_SLOT: события слота отбрасываются до следующего валидного
    current_slot: Option<usize>,
    x_range: AxisRange,
    y_range: AxisRange,
    pressure_range: Option<AxisRange>,
    dropped: bool,
}

impl MtFrameDecoder {
    pub fn new(
        slot_count: Option<usize>,
        x_range: AxisRange,
        y_range: AxisRange,
        pressure_range: Option<AxisRange>,
    ) -> Self {
        let slot_count = slot_count.filter(|n| *n > 0).unwrap_or(DEFAULT_SLOTS);
        Self {
            slots: vec![SlotState::default(); slot_count],
            current_slot: Some(0),
            x_range,
            y_range,
            pressure_range,
            dropped: false,
        }
    }

    pub fn feed(&mut self, input: MtInput, timestamp: Duration) -> Option<Decoded> {
        if self.dropped {
            // После SYN_DROPPED всё до следующего SYN_REPORT игнорируется
            if input == MtInput::SynReport {
                self.dropped = false;
            }
            return None;
        }

        match input {
            MtInput::Slot(slot) => {
                self.select_slot(slot);
                None
            }
            MtInput::TrackingId(id) => {
                if let Some(slot) = self.slot_mut() {
                    slot.tracking_id = id;
                    if id < 0 {
                        slot.pressure = None;
                    }
                }
                None
            }
            MtInput::PositionX(x) => {
                if let Some(slot) = self.slot_mut() {
                    slot.x = x;
                }
                None
            }
            MtInput::PositionY(y) => {
                if let Some(slot) = self.slot_mut() {
                    slot.y = y;
                }
                None
            }
            MtInput::Pressure(pressure) => {
                if let Some(slot) = self.slot_mut() {
                    slot.pressure = Some(pressure);
                }
                None
            }
            MtInput::SynReport => Some(Decoded::Frame(self.snapshot(timestamp))),
            MtInput::SynDropped => {
                warn!("Ядро сообщило о потере событий (SYN_DROPPED) - сброс слотов");
                self.slots.fill(SlotState::default());
                self.current_slot = None;
                self.dropped = true;
                Some(Decoded::Reset)
            }
            MtInput::Other => None,
        }
    }

    /// Текущий слот после потери событий, как его сообщает устройство (EVIOCGABS)
    pub fn resync_slot(&mut self, slot: i32) {
        self.select_slot(slot);
    }

    fn select_slot(&mut self, slot: i32) {
        self.current_slot = usize::try_from(slot).ok().filter(|s| *s < self.slots.len());
        if self.current_slot.is_none() {
            warn!("Слот {} вне диапазона устройства - события слота игнорируются", slot);
        }
    }

    fn slot_mut(&mut self) -> Option<&mut SlotState> {
        let index = self.current_slot?;
        self.slots.get_mut(index)
    }

    fn snapshot(&self, timestamp: Duration) -> Frame {
        let mut frame = Frame::new(timestamp);
        for slot in self.slots.iter().filter(|s| s.tracking_id >= 0) {
            let pressure = match (slot.pressure, self.pressure_range) {
                (Some(value), Some(range)) => range.normalize(value),
                _ => 1.0,
            };
            frame.contacts.push(Contact {
                identifier: slot.tracking_id,
                position: Position::new(
                    self.x_range.normalize(slot.x),
                    self.y_range.normalize(slot.y),
                ),
                pressure,
                timestamp,
            });
        }
        trace_if_enabled!("{}", frame);
        frame
    }
}
