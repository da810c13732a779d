//! Configuration for the Tracer control chain
//!
//! Every parameter has a default tuned for a small steering robot with a
//! 12-bit three-channel reflectance array. Each section validates itself; the
//! component constructors call `validate()` so a bad value is reported before
//! the loop ever runs.

use crate::error::ConfigError;
use core::str::FromStr;

/// Largest oversampled batch the loop will collect per tick.
pub const MAX_OVERSAMPLE: usize = 16;

/// Whether the tracked line reads darker or lighter than the floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Line reflects less than the background (tape on a light floor)
    #[default]
    Dark,
    /// Line reflects more than the background
    Light,
}

impl Polarity {
    /// Sign that turns a deviation from the mean into line evidence.
    pub(crate) fn evidence_sign(self) -> f32 {
        match self {
            Polarity::Dark => -1.0,
            Polarity::Light => 1.0,
        }
    }
}

impl FromStr for Polarity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("dark") {
            Ok(Polarity::Dark)
        } else if s.eq_ignore_ascii_case("light") {
            Ok(Polarity::Light)
        } else {
            Err(ConfigError::InvalidPolarity)
        }
    }
}

/// Sample smoothing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterConfig {
    /// Raw reads averaged per tick
    pub oversample: usize,
    /// Exponential smoothing factor in (0, 1]; higher follows new data faster
    pub ema_alpha: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            oversample: 3,
            ema_alpha: 0.35,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oversample == 0 || self.oversample > MAX_OVERSAMPLE {
            return Err(ConfigError::Oversample {
                count: self.oversample,
                max: MAX_OVERSAMPLE,
            });
        }
        unit_interval("ema_alpha", self.ema_alpha, false)
    }
}

/// Line presence and offset estimation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EstimatorConfig {
    pub polarity: Polarity,
    /// Offsets closer than this to zero snap to zero
    pub deadband: f32,
    /// Contrast (ADC counts) needed to enter Track
    pub contrast_on: f32,
    /// Contrast (ADC counts) below which Track drops to Lost
    pub contrast_off: f32,
    /// Offset low-pass factor in (0, 1]
    pub offset_alpha: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            polarity: Polarity::Dark,
            deadband: 0.05,
            contrast_on: 60.0,
            contrast_off: 30.0,
            offset_alpha: 0.35,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("contrast_off", self.contrast_off)?;
        // Written so NaN thresholds fail as well
        if !(self.contrast_off < self.contrast_on) {
            return Err(ConfigError::InvertedHysteresis {
                on: self.contrast_on,
                off: self.contrast_off,
            });
        }
        if !(0.0..1.0).contains(&self.deadband) {
            return Err(ConfigError::OutOfRange {
                name: "deadband",
                value: self.deadband,
            });
        }
        unit_interval("offset_alpha", self.offset_alpha, false)
    }
}

/// Steering and speed control parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    /// Proportional gain, degrees per unit offset
    pub kp: f32,
    /// Derivative gain, degrees per unit offset per second
    pub kd: f32,
    /// Platform steering limit (degrees)
    pub max_angle: f32,
    /// Steering slew limit (degrees per second)
    pub max_slew_deg_per_s: f32,
    /// Blend factor toward the rate-limited angle, in (0, 1]
    pub angle_alpha: f32,
    /// Cruise power when centered and confident
    pub base_speed: u8,
    /// Lowest power that still moves the robot
    pub min_speed: u8,
    /// Creep power while searching (0 = stop while lost)
    pub search_speed: u8,
    /// How strongly offset or doubt throttle the speed, in [0, 1]
    pub speed_scale: f32,
    /// Search sweep amplitude (degrees)
    pub search_max_deg: f32,
    /// Search sweep period (seconds)
    pub search_period_s: f32,
    /// Time spent committed to the last-seen side before sweeping (seconds)
    pub hold_last_s: f32,
    /// Hold angle as a fraction of the sweep amplitude
    pub hold_bias_frac: f32,
    /// Constant sweep bias toward the last-seen side, as a fraction of the amplitude
    pub search_bias_frac: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: 22.0,
            kd: 1.5,
            max_angle: 30.0,
            max_slew_deg_per_s: 180.0,
            angle_alpha: 0.6,
            base_speed: 35,
            min_speed: 20,
            search_speed: 20,
            speed_scale: 0.6,
            search_max_deg: 25.0,
            search_period_s: 1.6,
            hold_last_s: 0.4,
            hold_bias_frac: 0.6,
            search_bias_frac: 0.15,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("kp", self.kp)?;
        non_negative("kd", self.kd)?;
        positive("max_angle", self.max_angle)?;
        positive("max_slew_deg_per_s", self.max_slew_deg_per_s)?;
        unit_interval("angle_alpha", self.angle_alpha, false)?;
        speed("base_speed", self.base_speed)?;
        speed("min_speed", self.min_speed)?;
        speed("search_speed", self.search_speed)?;
        if self.min_speed > self.base_speed {
            return Err(ConfigError::SpeedOrdering {
                min: self.min_speed,
                base: self.base_speed,
            });
        }
        unit_interval("speed_scale", self.speed_scale, true)?;
        non_negative("search_max_deg", self.search_max_deg)?;
        positive("search_period_s", self.search_period_s)?;
        non_negative("hold_last_s", self.hold_last_s)?;
        unit_interval("hold_bias_frac", self.hold_bias_frac, true)?;
        unit_interval("search_bias_frac", self.search_bias_frac, true)
    }
}

/// Complete parameter set for one control loop
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TracerConfig {
    pub filter: FilterConfig,
    pub estimator: EstimatorConfig,
    pub controller: ControllerConfig,
    /// Control period (seconds)
    pub period_s: f32,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            estimator: EstimatorConfig::default(),
            controller: ControllerConfig::default(),
            period_s: 0.05,
        }
    }
}

impl TracerConfig {
    /// Validate every section, reporting the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        self.estimator.validate()?;
        self.controller.validate()?;
        positive("period_s", self.period_s)
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

/// Accepts (0, 1], or [0, 1] when `allow_zero` is set.
fn unit_interval(name: &'static str, value: f32, allow_zero: bool) -> Result<(), ConfigError> {
    let above_floor = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if above_floor && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value })
    }
}

fn speed(name: &'static str, value: u8) -> Result<(), ConfigError> {
    if value <= 100 {
        Ok(())
    } else {
        Err(ConfigError::Speed { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(TracerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_polarity_parsing() {
        assert_eq!("dark".parse::<Polarity>(), Ok(Polarity::Dark));
        assert_eq!("Light".parse::<Polarity>(), Ok(Polarity::Light));
        assert_eq!(
            "grey".parse::<Polarity>(),
            Err(ConfigError::InvalidPolarity)
        );
    }

    #[test]
    fn test_inverted_hysteresis_rejected() {
        let config = EstimatorConfig {
            contrast_on: 30.0,
            contrast_off: 30.0,
            ..EstimatorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedHysteresis { on: 30.0, off: 30.0 })
        );
    }

    #[test]
    fn test_non_positive_gain_rejected() {
        let config = ControllerConfig {
            kp: 0.0,
            ..ControllerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "kp",
                value: 0.0
            })
        );

        let config = ControllerConfig {
            kd: -1.0,
            ..ControllerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative { name: "kd", .. })
        ));
    }

    #[test]
    fn test_speed_limits() {
        let config = ControllerConfig {
            base_speed: 120,
            ..ControllerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Speed {
                name: "base_speed",
                ..
            })
        ));

        let config = ControllerConfig {
            min_speed: 50,
            base_speed: 40,
            ..ControllerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::SpeedOrdering { min: 50, base: 40 })
        );

        // Stopping while lost is a valid choice
        let config = ControllerConfig {
            search_speed: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_oversample_bounds() {
        for count in [0, MAX_OVERSAMPLE + 1] {
            let config = FilterConfig {
                oversample: count,
                ..FilterConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::Oversample {
                    count,
                    max: MAX_OVERSAMPLE
                })
            );
        }
    }

    #[test]
    fn test_alpha_and_period_ranges() {
        let config = FilterConfig {
            ema_alpha: 1.5,
            ..FilterConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TracerConfig {
            period_s: 0.0,
            ..TracerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "period_s",
                value: 0.0
            })
        );
    }
}
