//! Line presence and lateral offset estimation with hysteresis.
//!
//! Contrast (max minus min of the three filtered channels) drives a two-state
//! machine:
//!
//! ```text
//!            contrast >= contrast_on
//!   Lost  ----------------------------->  Track
//!         <-----------------------------
//!            contrast < contrast_off
//!            (or no positive evidence)
//! ```
//!
//! While tracking, each channel's deviation from the channel mean is turned
//! into line evidence (sign flipped for dark lines), negative evidence is
//! dropped, and the offset is the evidence-weighted position over
//! left = +1, center = 0, right = -1.

use crate::config::{EstimatorConfig, Polarity};
use crate::error::ConfigError;
use crate::types::{CHANNELS, EPSILON, FilteredSample, LineEstimate, Mode, deadband};

/// Lateral position of each channel, positive = left.
const POSITION_WEIGHTS: [f32; CHANNELS] = [1.0, 0.0, -1.0];

/// Hysteretic line estimator.
#[derive(Debug, Clone)]
pub struct LineEstimator {
    polarity: Polarity,
    deadband: f32,
    contrast_on: f32,
    contrast_off: f32,
    offset_alpha: f32,
    tracking: bool,
    last_offset: f32,
}

impl LineEstimator {
    pub fn new(config: &EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            polarity: config.polarity,
            deadband: config.deadband,
            contrast_on: config.contrast_on,
            contrast_off: config.contrast_off,
            offset_alpha: config.offset_alpha,
            tracking: false,
            last_offset: 0.0,
        })
    }

    /// Estimate the line position for one filtered sample.
    pub fn estimate(&mut self, sample: FilteredSample) -> LineEstimate {
        let values = sample.map(f32::from);
        let contrast = contrast(&values);
        let confidence = self.confidence(contrast);

        if self.tracking {
            if contrast < self.contrast_off {
                self.set_tracking(false, contrast);
            }
        } else if contrast >= self.contrast_on {
            self.set_tracking(true, contrast);
        }

        if !self.tracking {
            return self.lost(confidence);
        }

        let Some(raw_offset) = self.centroid(&values) else {
            // Contrast passed but no channel stands out in the line's direction
            self.set_tracking(false, contrast);
            return self.lost(confidence);
        };

        let offset = deadband(raw_offset.clamp(-1.0, 1.0), self.deadband);
        let smoothed = self.last_offset + self.offset_alpha * (offset - self.last_offset);
        let smoothed = deadband(smoothed, self.deadband);
        self.last_offset = smoothed;

        LineEstimate {
            offset: smoothed,
            confidence,
            mode: Mode::Track,
        }
    }

    /// Current mode without consuming a sample.
    pub fn mode(&self) -> Mode {
        if self.tracking { Mode::Track } else { Mode::Lost }
    }

    /// Last smoothed offset, reported while lost.
    pub fn last_offset(&self) -> f32 {
        self.last_offset
    }

    /// Return to the initial Lost state with a centered offset.
    pub fn reset(&mut self) {
        self.tracking = false;
        self.last_offset = 0.0;
    }

    fn confidence(&self, contrast: f32) -> f32 {
        let span = (self.contrast_on - self.contrast_off).max(EPSILON);
        ((contrast - self.contrast_off) / span).clamp(0.0, 1.0)
    }

    /// Evidence-weighted position, or `None` when there is no positive evidence.
    fn centroid(&self, values: &[f32; CHANNELS]) -> Option<f32> {
        let mean = values.iter().sum::<f32>() / CHANNELS as f32;
        let sign = self.polarity.evidence_sign();
        let evidence = values.map(|v| (sign * (v - mean)).max(0.0));

        let total: f32 = evidence.iter().sum();
        if total < EPSILON {
            return None;
        }

        let weighted: f32 = evidence
            .iter()
            .zip(POSITION_WEIGHTS)
            .map(|(w, pos)| w * pos)
            .sum();
        Some(weighted / total)
    }

    fn lost(&self, confidence: f32) -> LineEstimate {
        LineEstimate {
            offset: self.last_offset,
            confidence,
            mode: Mode::Lost,
        }
    }

    #[cfg_attr(not(feature = "defmt"), allow(unused_variables))]
    fn set_tracking(&mut self, tracking: bool, contrast: f32) {
        self.tracking = tracking;
        if tracking {
            debug!("line acquired, contrast {}", contrast);
        } else {
            debug!("line lost, contrast {}", contrast);
        }
    }
}

fn contrast(values: &[f32; CHANNELS]) -> f32 {
    let max = values.iter().copied().fold(f32::MIN, f32::max);
    let min = values.iter().copied().fold(f32::MAX, f32::min);
    max - min
}
