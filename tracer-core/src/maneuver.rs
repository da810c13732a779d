//! Scripted open-loop maneuvers.
//!
//! Each maneuver is a fixed list of legs: set the steering to a hard lock,
//! let the servo settle, drive for a fraction of the leg time. Angles follow
//! the control convention (positive = left). Every maneuver finishes stopped
//! with the wheels centered.

use embedded_hal_async::delay::DelayNs;

use crate::traits::Actuator;

/// Named maneuver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Maneuver {
    /// Reverse into a space on the left
    ParkLeft,
    /// Reverse into a space on the right
    ParkRight,
    /// Three-point turn to the left
    KTurnLeft,
    /// Three-point turn to the right
    KTurnRight,
}

/// One segment of a maneuver, written for the left-hand variant.
#[derive(Clone, Copy, Debug)]
struct Leg {
    /// +1 = full left lock, -1 = full right lock
    lock: f32,
    reverse: bool,
    /// Fraction of `leg_ms`
    span: f32,
    /// Stop the motor at the end of the leg
    halt: bool,
}

const PARK: [Leg; 2] = [
    Leg {
        lock: 1.0,
        reverse: true,
        span: 1.0,
        halt: false,
    },
    Leg {
        lock: -1.0,
        reverse: true,
        span: 1.0,
        halt: false,
    },
];

const K_TURN: [Leg; 3] = [
    Leg {
        lock: 1.0,
        reverse: false,
        span: 1.0,
        halt: true,
    },
    Leg {
        lock: -1.0,
        reverse: true,
        span: 1.0,
        halt: true,
    },
    Leg {
        lock: 1.0,
        reverse: false,
        span: 0.65,
        halt: true,
    },
];

impl Maneuver {
    /// Decode a wire code (0-3).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Maneuver::ParkLeft),
            1 => Some(Maneuver::ParkRight),
            2 => Some(Maneuver::KTurnLeft),
            3 => Some(Maneuver::KTurnRight),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Maneuver::ParkLeft => 0,
            Maneuver::ParkRight => 1,
            Maneuver::KTurnLeft => 2,
            Maneuver::KTurnRight => 3,
        }
    }

    /// Legs and the steering sign that mirrors them to the requested side.
    fn legs(self) -> (&'static [Leg], f32) {
        match self {
            Maneuver::ParkLeft => (&PARK, 1.0),
            Maneuver::ParkRight => (&PARK, -1.0),
            Maneuver::KTurnLeft => (&K_TURN, 1.0),
            Maneuver::KTurnRight => (&K_TURN, -1.0),
        }
    }
}

/// Timing and strength of scripted maneuvers
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ManeuverConfig {
    /// Drive power for every leg
    pub speed: u8,
    /// Duration of a full leg (ms)
    pub leg_ms: u32,
    /// Pause after steering before driving (ms)
    pub settle_ms: u32,
    /// Hard lock as a fraction of `max_angle`, kept short of the end stops
    pub lock_frac: f32,
    /// Platform steering limit (degrees)
    pub max_angle: f32,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            speed: 60,
            leg_ms: 2000,
            settle_ms: 150,
            lock_frac: 0.9,
            max_angle: 30.0,
        }
    }
}

impl ManeuverConfig {
    /// Steering angle used for every locked leg.
    pub fn hard_lock(&self) -> f32 {
        self.lock_frac * self.max_angle
    }
}

/// Steer, settle, drive for `duration_ms`, then stop and recenter.
///
/// Positive `speed` drives forward, negative reverses; magnitude is capped at 100.
pub async fn drive<A, D>(
    actuator: &mut A,
    delay: &mut D,
    speed: i8,
    steering_deg: f32,
    duration_ms: u32,
    settle_ms: u32,
) where
    A: Actuator,
    D: DelayNs,
{
    actuator.set_steering_angle(steering_deg);
    delay.delay_ms(settle_ms).await;
    apply_power(actuator, speed);
    delay.delay_ms(duration_ms).await;
    actuator.stop();
    actuator.set_steering_angle(0.0);
}

/// Run a scripted maneuver to completion.
pub async fn perform<A, D>(maneuver: Maneuver, actuator: &mut A, delay: &mut D, config: &ManeuverConfig)
where
    A: Actuator,
    D: DelayNs,
{
    info!("maneuver {} starting", maneuver);

    let (legs, mirror) = maneuver.legs();
    let lock = config.hard_lock();
    for leg in legs {
        actuator.set_steering_angle(mirror * leg.lock * lock);
        delay.delay_ms(config.settle_ms).await;
        if leg.reverse {
            actuator.drive_backward(config.speed);
        } else {
            actuator.drive_forward(config.speed);
        }
        delay
            .delay_ms(libm::roundf(config.leg_ms as f32 * leg.span) as u32)
            .await;
        if leg.halt {
            actuator.stop();
        }
    }

    actuator.stop();
    actuator.set_steering_angle(0.0);
}

fn apply_power<A: Actuator>(actuator: &mut A, speed: i8) {
    let power = speed.unsigned_abs().min(100);
    if speed > 0 {
        actuator.drive_forward(power);
    } else if speed < 0 {
        actuator.drive_backward(power);
    } else {
        actuator.stop();
    }
}
