//! Steering and speed control.
//!
//! Tracking uses a PD law on the lateral offset. When the line is lost the
//! controller first commits toward the side the line was last seen on, then
//! sweeps a triangle wave until the estimator re-acquires. Both targets pass
//! through the same slew limiter and smoothing blend, so the servo never jumps
//! when the mode changes.

use crate::config::ControllerConfig;
use crate::error::ConfigError;
use crate::types::{DriveCommand, LineEstimate, Mode};

/// Floor for the derivative time step (seconds).
pub const MIN_DT_S: f32 = 1e-3;

/// State carried between control ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerState {
    /// Angle commanded on the previous tick (degrees)
    pub previous_angle: f32,
    /// Offset from the most recent tracked tick
    pub last_known_offset: f32,
    /// Controller time (seconds) at which the current loss began
    pub lost_since: Option<f64>,
}

/// PD steering with rate limiting, confidence-scaled speed and search sweep.
#[derive(Debug, Clone)]
pub struct MotionController {
    config: ControllerConfig,
    state: ControllerState,
    /// Sum of all step durations
    clock_s: f64,
}

impl MotionController {
    pub fn new(config: &ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: *config,
            state: ControllerState::default(),
            clock_s: 0.0,
        })
    }

    /// Advance one tick of `dt` seconds.
    pub fn step(&mut self, estimate: &LineEstimate, dt: f32) -> DriveCommand {
        let dt = dt.max(MIN_DT_S);
        self.clock_s += f64::from(dt);

        let (target, speed) = match estimate.mode {
            Mode::Track => {
                let target = self.track_target(estimate.offset, dt);
                if self.state.lost_since.take().is_some() {
                    info!("line re-acquired at offset {}", estimate.offset);
                }
                self.state.last_known_offset = estimate.offset;
                (target, self.track_speed(estimate))
            }
            Mode::Lost => {
                let lost_since = match self.state.lost_since {
                    Some(since) => since,
                    None => {
                        warn!(
                            "line lost, searching from offset {}",
                            self.state.last_known_offset
                        );
                        self.state.lost_since = Some(self.clock_s);
                        self.clock_s
                    }
                };
                let lost_for = (self.clock_s - lost_since) as f32;
                (self.search_target(lost_for), self.config.search_speed)
            }
        };

        let angle = self.shape(target, dt);
        DriveCommand { angle, speed }
    }

    /// Unshaped steering target after `lost_for` seconds without the line.
    ///
    /// Holds toward the last-seen side for `hold_last_s`, then sweeps a
    /// triangle wave of amplitude `search_max_deg` starting toward that side,
    /// offset by a small constant bias toward it.
    pub fn search_target(&self, lost_for: f32) -> f32 {
        let amplitude = self.config.search_max_deg;
        let side = side_of(self.state.last_known_offset);

        if lost_for < self.config.hold_last_s {
            return side * self.config.hold_bias_frac * amplitude;
        }

        let cycles = (lost_for - self.config.hold_last_s) / self.config.search_period_s;
        let phase = cycles - libm::floorf(cycles);
        let lead = if side == 0.0 { 1.0 } else { side };
        lead * amplitude * triangle(phase) + side * self.config.search_bias_frac * amplitude
    }

    /// Forget steering history and lost-line timing.
    pub fn reset(&mut self) {
        self.state = ControllerState::default();
        self.clock_s = 0.0;
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn track_target(&self, offset: f32, dt: f32) -> f32 {
        let derivative = (offset - self.state.last_known_offset) / dt;
        self.config.kp * offset + self.config.kd * derivative
    }

    fn track_speed(&self, estimate: &LineEstimate) -> u8 {
        let doubt = 1.0 - estimate.confidence;
        let severity = libm::fabsf(estimate.offset).max(doubt);
        let scale = 1.0 - self.config.speed_scale * severity;
        let speed = f32::from(self.config.base_speed) * scale;
        libm::roundf(speed.clamp(f32::from(self.config.min_speed), 100.0)) as u8
    }

    /// Clamp, slew-limit and blend a target into the next steering angle.
    fn shape(&mut self, target: f32, dt: f32) -> f32 {
        let max_angle = self.config.max_angle;
        let target = target.clamp(-max_angle, max_angle);
        let previous = self.state.previous_angle;

        let max_step = self.config.max_slew_deg_per_s * dt;
        let limited = previous + (target - previous).clamp(-max_step, max_step);
        let angle = previous + self.config.angle_alpha * (limited - previous);
        let angle = angle.clamp(-max_angle, max_angle);

        self.state.previous_angle = angle;
        angle
    }
}

fn side_of(offset: f32) -> f32 {
    if offset > 0.0 {
        1.0
    } else if offset < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Unit triangle wave: 0 -> +1 -> 0 -> -1 -> 0 over one phase cycle.
fn triangle(phase: f32) -> f32 {
    if phase < 0.25 {
        4.0 * phase
    } else if phase < 0.75 {
        2.0 - 4.0 * phase
    } else {
        4.0 * phase - 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DT: f32 = 0.05;

    fn controller() -> MotionController {
        MotionController::new(&ControllerConfig::default()).unwrap()
    }

    fn track(offset: f32, confidence: f32) -> LineEstimate {
        LineEstimate {
            offset,
            confidence,
            mode: Mode::Track,
        }
    }

    fn lost(offset: f32) -> LineEstimate {
        LineEstimate {
            offset,
            confidence: 0.0,
            mode: Mode::Lost,
        }
    }

    #[test]
    fn test_triangle_wave() {
        assert_abs_diff_eq!(triangle(0.0), 0.0);
        assert_abs_diff_eq!(triangle(0.25), 1.0);
        assert_abs_diff_eq!(triangle(0.5), 0.0);
        assert_abs_diff_eq!(triangle(0.75), -1.0);
        assert_abs_diff_eq!(triangle(0.999), -0.004, epsilon = 1e-4);
    }

    #[test]
    fn test_line_left_steers_left() {
        let mut c = controller();
        let cmd = c.step(&track(0.4, 1.0), DT);
        assert!(cmd.angle > 0.0);

        let mut c = controller();
        let cmd = c.step(&track(-0.4, 1.0), DT);
        assert!(cmd.angle < 0.0);
    }

    #[test]
    fn test_angle_converges_to_proportional_term() {
        let mut c = controller();
        let mut cmd = c.step(&track(0.5, 1.0), DT);
        for _ in 0..200 {
            cmd = c.step(&track(0.5, 1.0), DT);
        }
        assert_abs_diff_eq!(cmd.angle, 22.0 * 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_angle_clamped_to_platform_limit() {
        let mut c = MotionController::new(&ControllerConfig {
            kp: 80.0,
            ..ControllerConfig::default()
        })
        .unwrap();
        let mut cmd = c.step(&track(1.0, 1.0), DT);
        for _ in 0..100 {
            cmd = c.step(&track(1.0, 1.0), DT);
            assert!(cmd.angle <= 30.0);
        }
        assert_abs_diff_eq!(cmd.angle, 30.0, epsilon = 1e-3);
    }

    #[test]
    fn test_slew_bound_across_modes() {
        let mut c = controller();
        let max_step = 180.0 * DT;
        let mut previous = 0.0;
        let inputs = [
            track(1.0, 1.0),
            track(-1.0, 1.0),
            track(1.0, 1.0),
            lost(1.0),
            lost(1.0),
            track(-1.0, 0.2),
        ];
        for estimate in inputs.iter().cycle().take(120) {
            let cmd = c.step(estimate, DT);
            assert!((cmd.angle - previous).abs() <= max_step + 1e-4);
            previous = cmd.angle;
        }
    }

    #[test]
    fn test_track_speed_uses_worse_of_offset_and_doubt() {
        let mut c = controller();
        assert_eq!(c.step(&track(0.0, 1.0), DT).speed, 35);
        // Offset 0.25 dominates: 35 * (1 - 0.6 * 0.25) = 29.75
        assert_eq!(c.step(&track(0.25, 1.0), DT).speed, 30);
        // Doubt 0.75 dominates: 35 * 0.55 = 19.25, floored at min_speed
        assert_eq!(c.step(&track(0.0, 0.25), DT).speed, 20);
    }

    #[test]
    fn test_lost_speed_is_search_speed() {
        let mut c = MotionController::new(&ControllerConfig {
            search_speed: 0,
            ..ControllerConfig::default()
        })
        .unwrap();
        assert_eq!(c.step(&lost(0.0), DT).speed, 0);
        assert_eq!(controller().step(&lost(0.0), DT).speed, 20);
    }

    #[test]
    fn test_search_holds_last_side_then_sweeps() {
        let mut c = controller();
        c.step(&track(-0.6, 1.0), DT);
        c.step(&lost(-0.6), DT);
        assert!(c.state().lost_since.is_some());

        // Hold window: 0.6 of the amplitude toward the right
        assert_abs_diff_eq!(c.search_target(0.1), -15.0, epsilon = 1e-4);
        // Quarter period into the sweep: full amplitude to the right, plus bias
        let peak = c.search_target(0.4 + 0.4);
        assert_abs_diff_eq!(peak, -25.0 - 0.15 * 25.0, epsilon = 1e-3);
    }

    #[test]
    fn test_search_sweep_is_periodic_and_bounded() {
        let mut c = controller();
        c.step(&track(0.3, 1.0), DT);
        c.step(&lost(0.3), DT);

        let bound = 25.0 + 0.15 * 25.0;
        for i in 0..64 {
            let t = 2.0 + i as f32 * 0.05;
            let a = c.search_target(t);
            let b = c.search_target(t + 1.6);
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
            assert!(a.abs() <= bound + 1e-4);
        }
    }

    #[test]
    fn test_reacquire_clears_lost_since() {
        let mut c = controller();
        c.step(&track(0.2, 1.0), DT);
        for _ in 0..10 {
            c.step(&lost(0.2), DT);
        }
        let since = c.state().lost_since.unwrap();
        assert_abs_diff_eq!(since, 0.1, epsilon = 1e-6);

        c.step(&track(0.1, 1.0), DT);
        assert_eq!(c.state().lost_since, None);
        assert_eq!(c.state().last_known_offset, 0.1);

        // A new loss starts a fresh hold window
        c.step(&lost(0.1), DT);
        assert_abs_diff_eq!(c.state().lost_since.unwrap(), 0.65, epsilon = 1e-6);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut c = controller();
        for _ in 0..20 {
            c.step(&track(0.6, 1.0), DT);
        }
        c.step(&lost(0.6), DT);
        assert!(c.state().previous_angle > 5.0);

        c.reset();
        assert_eq!(*c.state(), ControllerState::default());
        assert_eq!(*c.config(), ControllerConfig::default());

        // Lost timing restarts from zero
        c.step(&lost(0.0), DT);
        assert_abs_diff_eq!(c.state().lost_since.unwrap(), 0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_dt_is_guarded() {
        let mut c = controller();
        let cmd = c.step(&track(1.0, 1.0), 0.0);
        assert!(cmd.angle.is_finite());
        assert!(cmd.angle.abs() <= 180.0 * MIN_DT_S + 1e-6);
    }
}
