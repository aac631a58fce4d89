use serde::{Deserialize, Serialize};
use std::fmt;

/// Направление свайпа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    pub const ALL: [SwipeDirection; 4] = [
        SwipeDirection::Left,
        SwipeDirection::Right,
        SwipeDirection::Up,
        SwipeDirection::Down,
    ];

    /// Аргумент для скрипта-обработчика
    pub fn as_arg(&self) -> &'static str {
        match self {
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
        }
    }

    /// Доминирующая ось по смещению. Ось y растёт вниз, поэтому отрицательный dy - это "up".
    /// При равных модулях побеждает горизонталь.
    pub fn from_displacement(dx: f32, dy: f32) -> Option<Self> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }

        if dx.abs() >= dy.abs() {
            if dx > 0.0 {
                Some(SwipeDirection::Right)
            } else {
                Some(SwipeDirection::Left)
            }
        } else if dy > 0.0 {
            Some(SwipeDirection::Down)
        } else {
            Some(SwipeDirection::Up)
        }
    }

    /// Смещение вдоль направления (положительное, если движение совпадает с направлением)
    pub fn travel(&self, dx: f32, dy: f32) -> f32 {
        match self {
            SwipeDirection::Left => -dx,
            SwipeDirection::Right => dx,
            SwipeDirection::Up => -dy,
            SwipeDirection::Down => dy,
        }
    }
}

impl fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_arg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_displacement() {
        assert_eq!(SwipeDirection::from_displacement(1.0, 0.0), Some(SwipeDirection::Right));
        assert_eq!(SwipeDirection::from_displacement(-1.0, 0.0), Some(SwipeDirection::Left));
        assert_eq!(SwipeDirection::from_displacement(0.0, 1.0), Some(SwipeDirection::Down));
        assert_eq!(SwipeDirection::from_displacement(0.0, -1.0), Some(SwipeDirection::Up));
        assert_eq!(SwipeDirection::from_displacement(0.0, 0.0), None);
    }

    #[test]
    fn test_diagonal_picks_dominant_axis() {
        assert_eq!(SwipeDirection::from_displacement(2.0, 1.0), Some(SwipeDirection::Right));
        assert_eq!(SwipeDirection::from_displacement(-2.0, -1.0), Some(SwipeDirection::Left));
        assert_eq!(SwipeDirection::from_displacement(1.0, 2.0), Some(SwipeDirection::Down));
        assert_eq!(SwipeDirection::from_displacement(1.0, -2.0), Some(SwipeDirection::Up));
        assert_eq!(SwipeDirection::from_displacement(1.0, -1.0), Some(SwipeDirection::Right));
    }

    #[test]
    fn test_as_arg_and_travel() {
        let args: Vec<&str> = SwipeDirection::ALL.iter().map(|d| d.as_arg()).collect();
        assert_eq!(args, vec!["left", "right", "up", "down"]);
        assert_eq!(SwipeDirection::Up.travel(0.1, -0.3), 0.3);
        assert_eq!(SwipeDirection::Left.to_string(), "left");
    }
}
