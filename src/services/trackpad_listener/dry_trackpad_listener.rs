use crate::error::Result;
use crate::events::{Frame, Position, SwipeDirection};
use crate::services::GesturePipeline;
use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::info;

use super::r#trait::TrackpadListenerTrait;

const FINGER_OFFSETS: [(i32, f32, f32); 3] = [(1, -0.10, 0.00), (2, 0.00, -0.03), (3, 0.10, 0.02)];
const SWIPE_STEPS: u64 = 8;
const SWIPE_TRAVEL: f32 = 0.30;

/// Кадры свайпа тремя пальцами: касания с разницей 2мс, восемь шагов по 10мс, общий отрыв
pub fn synthetic_swipe(direction: SwipeDirection, start: Duration) -> Vec<Frame> {
    let unit = match direction {
        SwipeDirection::Left => Position::new(-1.0, 0.0),
        SwipeDirection::Right => Position::new(1.0, 0.0),
        SwipeDirection::Up => Position::new(0.0, -1.0),
        SwipeDirection::Down => Position::new(0.0, 1.0),
    };
    let center = Position::new(0.5, 0.5) - unit.scale(SWIPE_TRAVEL / 2.0);
    let at = |ms: u64| start + Duration::from_millis(ms);

    let mut frames = Vec::new();

    for touched in 1..=FINGER_OFFSETS.len() {
        let mut frame = Frame::new(at(2 * (touched as u64 - 1)));
        for (id, ox, oy) in &FINGER_OFFSETS[..touched] {
            frame = frame.with_contact(*id, center.x + ox, center.y + oy);
        }
        frames.push(frame);
    }

    for step in 1..=SWIPE_STEPS {
        let shift = unit.scale(SWIPE_TRAVEL * step as f32 / SWIPE_STEPS as f32);
        let mut frame = Frame::new(at(10 * step));
        for (id, ox, oy) in &FINGER_OFFSETS {
            frame = frame.with_contact(*id, center.x + shift.x + ox, center.y + shift.y + oy);
        }
        frames.push(frame);
    }

    frames.push(Frame::new(at(10 * (SWIPE_STEPS + 1))));
    frames
}

pub struct DryRunTrackpadListener {
    pipeline: GesturePipeline,
    period: Duration,
}

impl DryRunTrackpadListener {
    pub fn new(pipeline: GesturePipeline) -> Result<Self> {
        info!("Инициализация DryRunTrackpadListener");
        Ok(Self {
            pipeline,
            period: Duration::from_secs(5),
        })
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("Dry-run режим - TrackpadListener работает в режиме эмуляции");

        let started = Instant::now();
        let mut ticker = interval(self.period);
        let mut index = 0;

        loop {
            ticker.tick().await;

            let direction = SwipeDirection::ALL[index % SwipeDirection::ALL.len()];
            info!("Dry-run: эмулируем свайп {}", direction);

            for frame in synthetic_swipe(direction, started.elapsed()) {
                self.pipeline.process_frame(&frame);
            }

            index += 1;
        }
    }
}

#[async_trait::async_trait]
impl TrackpadListenerTrait for DryRunTrackpadListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
