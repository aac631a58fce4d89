//! Распознавание свайпа тремя пальцами по событиям жизненного цикла пальцев.
//!
//! Группа пальцев проходит фазы Forming -> Active -> Ending -> Resolved,
//! любое нарушение переводит её в Rejected. Одновременно существует не более одной группы;
//! после завершения (успешного или нет) новая группа собирается только когда подняты все пальцы.

use crate::config::GestureConfig;
use crate::debug_if_enabled;
use crate::events::{ContactId, FingerEvent, Position, SwipeDirection};
use smallvec::SmallVec;
use std::fmt;
use std::time::Duration;

/// Единственная поддерживаемая арность жеста
pub const SWIPE_FINGERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupPhase {
    Forming,
    Active,
    Ending,
    Resolved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Палец коснулся позже окна совпадения
    LateStart,
    /// Пальцы слишком далеко друг от друга для одной руки
    TooSpread,
    /// Четвёртый палец
    ExtraFinger,
    /// Палец поднят до того, как собрались три
    EarlyLift,
    /// Пальцы двигаются в разные стороны
    Diverged,
    /// Пальцы поднимались не вместе
    BrokenSync,
    /// Смещение меньше порога
    TooShort,
    /// Сразу после жеста двумя пальцами
    TwoFingerCooldown,
    /// Касание началось, когда другие пальцы уже лежали вне группы
    Unaligned,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::LateStart => "палец коснулся за пределами окна совпадения",
            RejectReason::TooSpread => "пальцы слишком далеко друг от друга",
            RejectReason::ExtraFinger => "больше трёх пальцев",
            RejectReason::EarlyLift => "палец поднят до сборки группы",
            RejectReason::Diverged => "пальцы двигаются несогласованно",
            RejectReason::BrokenSync => "пальцы подняты не одновременно",
            RejectReason::TooShort => "смещение меньше порога",
            RejectReason::TwoFingerCooldown => "пауза после жеста двумя пальцами",
            RejectReason::Unaligned => "касание вне группы",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Copy)]
struct GroupMember {
    id: ContactId,
    origin: Position,
    last: Position,
    ended_at: Option<Duration>,
}

impl GroupMember {
    fn displacement(&self) -> Position {
        self.last - self.origin
    }
}

/// Кандидат в свайп: три пальца собрались, двигались и поднялись вместе
#[derive(Debug, Clone, PartialEq)]
pub struct SwipeCandidate {
    /// Среднее смещение участников
    pub displacement: Position,
    pub duration: Duration,
    pub member_displacements: SmallVec<[Position; SWIPE_FINGERS]>,
}

impl SwipeCandidate {
    /// Наибольшее отклонение пальца от среднего смещения относительно длины среднего.
    /// None, пока группа сдвинулась меньше `floor`.
    pub fn divergence(&self, floor: f32) -> Option<f32> {
        let mean = self.displacement;
        let scale = mean.length();
        if scale < floor {
            return None;
        }
        self.member_displacements
            .iter()
            .map(|d| (*d - mean).length() / scale)
            .reduce(f32::max)
    }
}

#[derive(Debug, Clone)]
struct FingerGroup {
    members: SmallVec<[GroupMember; SWIPE_FINGERS]>,
    phase: GroupPhase,
    first_start: Duration,
    first_end: Option<Duration>,
    reason: Option<RejectReason>,
}

impl FingerGroup {
    fn forming(id: ContactId, position: Position, timestamp: Duration) -> Self {
        let mut members = SmallVec::new();
        members.push(GroupMember {
            id,
            origin: position,
            last: position,
            ended_at: None,
        });
        Self {
            members,
            phase: GroupPhase::Forming,
            first_start: timestamp,
            first_end: None,
            reason: None,
        }
    }

    fn rejected(timestamp: Duration, reason: RejectReason) -> Self {
        Self {
            members: SmallVec::new(),
            phase: GroupPhase::Rejected,
            first_start: timestamp,
            first_end: None,
            reason: Some(reason),
        }
    }

    fn member_mut(&mut self, id: ContactId) -> Option<&mut GroupMember> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    fn is_open(&self) -> bool {
        matches!(
            self.phase,
            GroupPhase::Forming | GroupPhase::Active | GroupPhase::Ending
        )
    }

    fn reject(&mut self, reason: RejectReason) {
        debug_if_enabled!(
            "Группа из {} пальцев отклонена в фазе {:?}: {}",
            self.members.len(),
            self.phase,
            reason
        );
        self.phase = GroupPhase::Rejected;
        self.reason = Some(reason);
    }

    fn mean_displacement(&self) -> Position {
        if self.members.is_empty() {
            return Position::ORIGIN;
        }
        let sum = self
            .members
            .iter()
            .fold(Position::ORIGIN, |acc, m| acc + m.displacement());
        sum.scale(1.0 / self.members.len() as f32)
    }

    fn divergence(&self, floor: f32) -> Option<f32> {
        self.candidate().divergence(floor)
    }

    fn candidate(&self) -> SwipeCandidate {
        let last_end = self
            .members
            .iter()
            .filter_map(|m| m.ended_at)
            .max()
            .unwrap_or(self.first_start);
        SwipeCandidate {
            displacement: self.mean_displacement(),
            duration: last_end.saturating_sub(self.first_start),
            member_displacements: self.members.iter().map(|m| m.displacement()).collect(),
        }
    }
}

pub struct GestureClassifier {
    config: GestureConfig,
    group: Option<FingerGroup>,
    live: SmallVec<[ContactId; 5]>,
    session_max_fingers: usize,
    last_two_finger_end: Option<Duration>,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            group: None,
            live: SmallVec::new(),
            session_max_fingers: 0,
            last_two_finger_end: None,
        }
    }

    /// Обработать событие пальца. Возвращает направление, если группа завершилась успешно.
    pub fn handle(&mut self, event: &FingerEvent) -> Option<SwipeDirection> {
        let recognized = match *event {
            FingerEvent::Started { id, position, timestamp } => {
                self.on_started(id, position, timestamp);
                None
            }
            FingerEvent::Moved { id, position, .. } => {
                self.on_moved(id, position);
                None
            }
            FingerEvent::Ended { id, position, timestamp } => self.on_ended(id, position, timestamp),
        };

        if self.live.is_empty() {
            self.finish_session(event.timestamp());
        }

        recognized
    }

    /// Проверка таймаутов и согласованности движения. Вызывается один раз на кадр,
    /// после всех событий этого кадра.
    pub fn tick(&mut self, now: Duration) {
        let start_window = self.config.start_window();
        let end_window = self.config.end_window();
        let floor = self.divergence_floor();
        let threshold = self.config.divergence_threshold;

        let Some(group) = self.group.as_mut() else {
            return;
        };

        match group.phase {
            GroupPhase::Forming => {
                if now.saturating_sub(group.first_start) > start_window {
                    group.reject(RejectReason::LateStart);
                }
            }
            GroupPhase::Active | GroupPhase::Ending => {
                let timed_out = group
                    .first_end
                    .is_some_and(|first_end| now.saturating_sub(first_end) > end_window);
                if timed_out {
                    group.reject(RejectReason::BrokenSync);
                } else if group.divergence(floor).is_some_and(|d| d > threshold) {
                    group.reject(RejectReason::Diverged);
                }
            }
            GroupPhase::Resolved | GroupPhase::Rejected => {}
        }
    }

    fn on_started(&mut self, id: ContactId, position: Position, timestamp: Duration) {
        if !self.live.contains(&id) {
            self.live.push(id);
        }
        self.session_max_fingers = self.session_max_fingers.max(self.live.len());

        let Some(group) = self.group.as_mut() else {
            self.group = Some(self.open_group(id, position, timestamp));
            return;
        };

        match group.phase {
            GroupPhase::Forming => {
                if timestamp.saturating_sub(group.first_start) > self.config.start_window() {
                    group.reject(RejectReason::LateStart);
                } else if group
                    .members
                    .iter()
                    .any(|m| m.origin.distance(&position) > self.config.max_start_spread)
                {
                    group.reject(RejectReason::TooSpread);
                } else {
                    group.members.push(GroupMember {
                        id,
                        origin: position,
                        last: position,
                        ended_at: None,
                    });
                    if group.members.len() == SWIPE_FINGERS {
                        debug_if_enabled!(
                            "Группа из трёх пальцев собрана за {}мс",
                            timestamp.saturating_sub(group.first_start).as_millis()
                        );
                        group.phase = GroupPhase::Active;
                    }
                }
            }
            GroupPhase::Active | GroupPhase::Ending => group.reject(RejectReason::ExtraFinger),
            GroupPhase::Resolved | GroupPhase::Rejected => {}
        }
    }

    fn open_group(&self, id: ContactId, position: Position, timestamp: Duration) -> FingerGroup {
        if self.live.len() > 1 {
            return FingerGroup::rejected(timestamp, RejectReason::Unaligned);
        }

        let cooldown = self.config.two_finger_cooldown();
        if !cooldown.is_zero() {
            if let Some(last_end) = self.last_two_finger_end {
                if timestamp.saturating_sub(last_end) < cooldown {
                    debug_if_enabled!("Касание в паузе после жеста двумя пальцами - игнорируем");
                    return FingerGroup::rejected(timestamp, RejectReason::TwoFingerCooldown);
                }
            }
        }

        FingerGroup::forming(id, position, timestamp)
    }

    fn on_moved(&mut self, id: ContactId, position: Position) {
        let Some(group) = self.group.as_mut().filter(|g| g.is_open()) else {
            return;
        };
        if let Some(member) = group.member_mut(id) {
            if member.ended_at.is_none() {
                member.last = position;
            }
        }
    }

    fn on_ended(
        &mut self,
        id: ContactId,
        position: Position,
        timestamp: Duration,
    ) -> Option<SwipeDirection> {
        self.live.retain(|live| *live != id);

        let end_window = self.config.end_window();
        let group = self.group.as_mut().filter(|g| g.is_open())?;
        let phase = group.phase;
        let member = group.member_mut(id)?;
        member.last = position;
        member.ended_at = Some(timestamp);

        match phase {
            GroupPhase::Forming => {
                group.reject(RejectReason::EarlyLift);
                None
            }
            GroupPhase::Active => {
                group.first_end = Some(timestamp);
                group.phase = GroupPhase::Ending;
                None
            }
            GroupPhase::Ending => {
                let first_end = group.first_end.unwrap_or(timestamp);
                if timestamp.saturating_sub(first_end) > end_window {
                    group.reject(RejectReason::BrokenSync);
                    return None;
                }
                if group.members.iter().all(|m| m.ended_at.is_some()) {
                    self.resolve()
                } else {
                    None
                }
            }
            GroupPhase::Resolved | GroupPhase::Rejected => None,
        }
    }

    fn resolve(&mut self) -> Option<SwipeDirection> {
        let floor = self.divergence_floor();
        let group = self.group.as_mut()?;
        let candidate = group.candidate();

        if let Some(divergence) = candidate.divergence(floor) {
            if divergence > self.config.divergence_threshold {
                group.reject(RejectReason::Diverged);
                return None;
            }
        }

        let Position { x: dx, y: dy } = candidate.displacement;
        let Some(direction) = SwipeDirection::from_displacement(dx, dy) else {
            group.reject(RejectReason::TooShort);
            return None;
        };

        let travel = direction.travel(dx, dy);
        if travel < self.config.threshold_for(direction) {
            group.reject(RejectReason::TooShort);
            return None;
        }

        debug_if_enabled!(
            "Свайп {} распознан: смещение {}, длительность {}мс",
            direction,
            candidate.displacement,
            candidate.duration.as_millis()
        );
        group.phase = GroupPhase::Resolved;
        Some(direction)
    }

    /// Все пальцы подняты: группа отбрасывается, учитывается пауза после двух пальцев
    fn finish_session(&mut self, timestamp: Duration) {
        if self.session_max_fingers == 2 {
            self.last_two_finger_end = Some(timestamp);
        }
        self.session_max_fingers = 0;
        self.group = None;
    }

    /// Расхождение не оценивается, пока группа не сдвинулась на половину минимального порога
    fn divergence_floor(&self) -> f32 {
        SwipeDirection::ALL
            .iter()
            .map(|d| self.config.threshold_for(*d))
            .fold(f32::INFINITY, f32::min)
            * 0.5
    }

    #[allow(dead_code)]
    pub fn phase(&self) -> Option<GroupPhase> {
        self.group.as_ref().map(|g| g.phase)
    }

    #[allow(dead_code)]
    pub fn reject_reason(&self) -> Option<RejectReason> {
        self.group.as_ref().and_then(|g| g.reason)
    }

    #[allow(dead_code)]
    pub fn live_fingers(&self) -> usize {
        self.live.len()
    }

    /// Сбросить незавершённую группу (остановка или потеря кадров)
    pub fn reset(&mut self) {
        self.group = None;
        self.live.clear();
        self.session_max_fingers = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_divergence_uses_member_displacements() {
        let candidate = SwipeCandidate {
            displacement: Position::new(0.2, 0.0),
            duration: Duration::from_millis(40),
            member_displacements: SmallVec::from_slice(&[
                Position::new(0.2, 0.0),
                Position::new(0.1, 0.0),
                Position::new(0.3, 0.0),
            ]),
        };
        let divergence = candidate.divergence(0.05).unwrap();
        assert!((divergence - 0.5).abs() < 1e-5);

        // Ниже порога движения расхождение не оценивается
        assert_eq!(candidate.divergence(0.5), None);
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn start(id: ContactId, x: f32, y: f32, t: u64) -> FingerEvent {
        FingerEvent::Started { id, position: Position::new(x, y), timestamp: ms(t) }
    }

    fn moved(id: ContactId, x: f32, y: f32, t: u64) -> FingerEvent {
        FingerEvent::Moved { id, position: Position::new(x, y), timestamp: ms(t) }
    }

    fn end(id: ContactId, x: f32, y: f32, t: u64) -> FingerEvent {
        FingerEvent::Ended { id, position: Position::new(x, y), timestamp: ms(t) }
    }

    fn feed(classifier: &mut GestureClassifier, events: &[FingerEvent]) -> Vec<SwipeDirection> {
        events.iter().filter_map(|e| classifier.handle(e)).collect()
    }

    #[test]
    fn test_three_finger_swipe_left() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        let result = feed(
            &mut classifier,
            &[
                start(1, 0.6, 0.5, 0),
                start(2, 0.7, 0.5, 3),
                start(3, 0.8, 0.5, 5),
                moved(1, 0.45, 0.51, 20),
                moved(2, 0.55, 0.5, 20),
                moved(3, 0.66, 0.49, 20),
                end(1, 0.40, 0.51, 40),
                end(2, 0.50, 0.5, 40),
                end(3, 0.60, 0.49, 45),
            ],
        );
        assert_eq!(result, vec![SwipeDirection::Left]);
        assert_eq!(classifier.phase(), None);
    }

    #[test]
    fn test_phases_progress() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        feed(&mut classifier, &[start(1, 0.5, 0.5, 0), start(2, 0.55, 0.5, 1)]);
        assert_eq!(classifier.phase(), Some(GroupPhase::Forming));

        feed(&mut classifier, &[start(3, 0.6, 0.5, 2)]);
        assert_eq!(classifier.phase(), Some(GroupPhase::Active));

        feed(&mut classifier, &[end(1, 0.5, 0.3, 30)]);
        assert_eq!(classifier.phase(), Some(GroupPhase::Ending));
        assert_eq!(classifier.live_fingers(), 2);
    }

    #[test]
    fn test_late_third_finger_is_rejected() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        let result = feed(
            &mut classifier,
            &[
                start(1, 0.5, 0.5, 0),
                start(2, 0.55, 0.5, 10),
                start(3, 0.6, 0.5, 400),
            ],
        );
        assert!(result.is_empty());
        assert_eq!(classifier.reject_reason(), Some(RejectReason::LateStart));
    }

    #[test]
    fn test_forming_times_out_on_tick() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        feed(&mut classifier, &[start(1, 0.5, 0.5, 0), start(2, 0.55, 0.5, 10)]);
        classifier.tick(ms(100));
        assert_eq!(classifier.phase(), Some(GroupPhase::Forming));
        classifier.tick(ms(200));
        assert_eq!(classifier.reject_reason(), Some(RejectReason::LateStart));
    }

    #[test]
    fn test_spread_fingers_are_rejected() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        feed(&mut classifier, &[start(1, 0.05, 0.05, 0), start(2, 0.95, 0.95, 2)]);
        assert_eq!(classifier.reject_reason(), Some(RejectReason::TooSpread));
    }

    #[test]
    fn test_fourth_finger_invalidates_active_group() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        let result = feed(
            &mut classifier,
            &[
                start(1, 0.4, 0.5, 0),
                start(2, 0.5, 0.5, 0),
                start(3, 0.6, 0.5, 0),
                start(4, 0.7, 0.5, 5),
                moved(1, 0.7, 0.5, 20),
                moved(2, 0.8, 0.5, 20),
                moved(3, 0.9, 0.5, 20),
                end(4, 0.7, 0.5, 30),
                end(1, 0.7, 0.5, 40),
                end(2, 0.8, 0.5, 40),
                end(3, 0.9, 0.5, 40),
            ],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_early_lift_before_third_finger() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        feed(
            &mut classifier,
            &[start(1, 0.5, 0.5, 0), start(2, 0.55, 0.5, 2), end(2, 0.55, 0.5, 20)],
        );
        assert_eq!(classifier.reject_reason(), Some(RejectReason::EarlyLift));
        // Пока палец 1 лежит, новая группа не собирается
        feed(&mut classifier, &[start(5, 0.6, 0.5, 30)]);
        assert_eq!(classifier.phase(), Some(GroupPhase::Rejected));
    }

    #[test]
    fn test_opposite_finger_diverges() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        let result = feed(
            &mut classifier,
            &[
                start(1, 0.4, 0.5, 0),
                start(2, 0.5, 0.5, 0),
                start(3, 0.6, 0.5, 0),
                moved(1, 0.7, 0.5, 20),
                moved(2, 0.8, 0.5, 20),
                moved(3, 0.5, 0.5, 20),
            ],
        );
        assert!(result.is_empty());
        assert_eq!(classifier.phase(), Some(GroupPhase::Active));
        classifier.tick(ms(20));
        assert_eq!(classifier.reject_reason(), Some(RejectReason::Diverged));
    }

    #[test]
    fn test_broken_sync_on_lift() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        let result = feed(
            &mut classifier,
            &[
                start(1, 0.4, 0.5, 0),
                start(2, 0.5, 0.5, 0),
                start(3, 0.6, 0.5, 0),
                moved(1, 0.6, 0.5, 20),
                moved(2, 0.7, 0.5, 20),
                moved(3, 0.8, 0.5, 20),
                end(1, 0.6, 0.5, 30),
                end(2, 0.7, 0.5, 35),
                end(3, 0.8, 0.5, 600),
            ],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_ending_times_out_on_tick() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        feed(
            &mut classifier,
            &[
                start(1, 0.4, 0.5, 0),
                start(2, 0.5, 0.5, 0),
                start(3, 0.6, 0.5, 0),
                moved(1, 0.6, 0.5, 20),
                end(1, 0.6, 0.5, 30),
            ],
        );
        classifier.tick(ms(250));
        assert_eq!(classifier.reject_reason(), Some(RejectReason::BrokenSync));
    }

    #[test]
    fn test_stationary_rest_is_too_short() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        let result = feed(
            &mut classifier,
            &[
                start(1, 0.4, 0.5, 0),
                start(2, 0.5, 0.5, 0),
                start(3, 0.6, 0.5, 0),
                moved(1, 0.41, 0.5, 100),
                end(1, 0.41, 0.5, 500),
                end(2, 0.5, 0.5, 500),
                end(3, 0.6, 0.5, 500),
            ],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_per_direction_threshold() {
        let config = GestureConfig {
            up: Some(0.3),
            ..GestureConfig::default()
        };
        let mut classifier = GestureClassifier::new(config);
        let swipe_up = [
            start(1, 0.4, 0.6, 0),
            start(2, 0.5, 0.6, 0),
            start(3, 0.6, 0.6, 0),
            moved(1, 0.4, 0.4, 20),
            moved(2, 0.5, 0.4, 20),
            moved(3, 0.6, 0.4, 20),
            end(1, 0.4, 0.4, 40),
            end(2, 0.5, 0.4, 40),
            end(3, 0.6, 0.4, 40),
        ];
        // 0.2 вверх меньше порога 0.3 для "up"
        assert!(feed(&mut classifier, &swipe_up).is_empty());
        assert_eq!(classifier.phase(), None);
    }

    #[test]
    fn test_two_finger_cooldown() {
        let config = GestureConfig {
            two_finger_cooldown_ms: 500,
            ..GestureConfig::default()
        };
        let mut classifier = GestureClassifier::new(config);
        feed(
            &mut classifier,
            &[
                start(1, 0.5, 0.5, 0),
                start(2, 0.55, 0.5, 0),
                moved(1, 0.5, 0.7, 50),
                end(1, 0.5, 0.7, 100),
                end(2, 0.55, 0.7, 100),
            ],
        );

        let swipe = |t: u64| {
            [
                start(10, 0.4, 0.5, t),
                start(11, 0.5, 0.5, t),
                start(12, 0.6, 0.5, t),
                moved(10, 0.6, 0.5, t + 20),
                moved(11, 0.7, 0.5, t + 20),
                moved(12, 0.8, 0.5, t + 20),
                end(10, 0.6, 0.5, t + 40),
                end(11, 0.7, 0.5, t + 40),
                end(12, 0.8, 0.5, t + 40),
            ]
        };

        assert!(feed(&mut classifier, &swipe(300)).is_empty());
        assert_eq!(feed(&mut classifier, &swipe(1000)), vec![SwipeDirection::Right]);
    }

    #[test]
    fn test_reset_discards_group() {
        let mut classifier = GestureClassifier::new(GestureConfig::default());
        feed(
            &mut classifier,
            &[start(1, 0.4, 0.5, 0), start(2, 0.5, 0.5, 0), start(3, 0.6, 0.5, 0)],
        );
        classifier.reset();
        assert_eq!(classifier.phase(), None);
        assert_eq!(classifier.live_fingers(), 0);
    }
}
