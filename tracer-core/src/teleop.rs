//! Single-key manual driving.
//!
//! | key | action |
//! |-----|--------|
//! | `w` / `s` | forward / backward, straight |
//! | `a` / `d` | forward, left / right |
//! | `z` / `c` | backward, left / right |
//! | `x`, `q`, space | stop |
//! | `1`-`4` | park left, park right, k-turn left, k-turn right |

use crate::maneuver::Maneuver;

/// What a key asks the robot to do.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TeleopAction {
    /// Timed drive; negative speed reverses, positive steering turns left
    Drive {
        speed: i8,
        steering_deg: f32,
        duration_ms: u32,
    },
    /// Scripted maneuver
    Maneuver(Maneuver),
    /// Stop and recenter
    Stop,
}

/// Manual driving strength
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TeleopConfig {
    pub speed: u8,
    pub steering_deg: f32,
    pub duration_ms: u32,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            speed: 80,
            steering_deg: 20.0,
            duration_ms: 3000,
        }
    }
}

/// Map a key byte to an action. Letters are case-insensitive.
pub fn action_for_key(key: u8, config: &TeleopConfig) -> Option<TeleopAction> {
    let forward = config.speed.min(100) as i8;
    let steer = config.steering_deg;

    let (speed, steering_deg) = match key.to_ascii_lowercase() {
        b'w' => (forward, 0.0),
        b's' => (-forward, 0.0),
        b'a' => (forward, steer),
        b'd' => (forward, -steer),
        b'z' => (-forward, steer),
        b'c' => (-forward, -steer),
        b'x' | b'q' | b' ' => return Some(TeleopAction::Stop),
        b'1'..=b'4' => return Maneuver::from_code(key - b'1').map(TeleopAction::Maneuver),
        _ => return None,
    };

    Some(TeleopAction::Drive {
        speed,
        steering_deg,
        duration_ms: config.duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_keys() {
        let config = TeleopConfig::default();
        assert_eq!(
            action_for_key(b'w', &config),
            Some(TeleopAction::Drive {
                speed: 80,
                steering_deg: 0.0,
                duration_ms: 3000
            })
        );
        assert_eq!(
            action_for_key(b'Z', &config),
            Some(TeleopAction::Drive {
                speed: -80,
                steering_deg: 20.0,
                duration_ms: 3000
            })
        );
        assert_eq!(
            action_for_key(b'd', &config),
            Some(TeleopAction::Drive {
                speed: 80,
                steering_deg: -20.0,
                duration_ms: 3000
            })
        );
    }

    #[test]
    fn test_stop_and_maneuver_keys() {
        let config = TeleopConfig::default();
        assert_eq!(action_for_key(b'x', &config), Some(TeleopAction::Stop));
        assert_eq!(action_for_key(b' ', &config), Some(TeleopAction::Stop));
        assert_eq!(
            action_for_key(b'1', &config),
            Some(TeleopAction::Maneuver(Maneuver::ParkLeft))
        );
        assert_eq!(
            action_for_key(b'4', &config),
            Some(TeleopAction::Maneuver(Maneuver::KTurnRight))
        );
    }

    #[test]
    fn test_unknown_key() {
        assert_eq!(action_for_key(b'?', &TeleopConfig::default()), None);
        assert_eq!(action_for_key(b'5', &TeleopConfig::default()), None);
    }

    #[test]
    fn test_speed_capped() {
        let config = TeleopConfig {
            speed: 200,
            ..TeleopConfig::default()
        };
        assert!(matches!(
            action_for_key(b'w', &config),
            Some(TeleopAction::Drive { speed: 100, .. })
        ));
    }
}
