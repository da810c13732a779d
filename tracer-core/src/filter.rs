//! Oversampled averaging plus exponential smoothing of raw readings.

use crate::config::FilterConfig;
use crate::error::ConfigError;
use crate::types::{CHANNELS, FilteredSample, RawSample};

/// Three-channel sample smoother.
///
/// Each call averages one oversampled batch, then blends it into a running
/// exponential moving average. The average is kept unrounded so quantization
/// error does not accumulate; only the returned sample is rounded to ADC counts.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    alpha: f32,
    ema: Option<[f32; CHANNELS]>,
}

impl SampleFilter {
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            alpha: config.ema_alpha,
            ema: None,
        })
    }

    /// Fold a batch of back-to-back reads into the running average.
    ///
    /// The first batch seeds the average directly. An empty batch leaves the
    /// state untouched and returns the current output.
    pub fn filter(&mut self, batch: &[RawSample]) -> FilteredSample {
        if batch.is_empty() {
            return self.current();
        }

        let mut avg = [0.0f32; CHANNELS];
        for sample in batch {
            for (acc, &value) in avg.iter_mut().zip(sample) {
                *acc += f32::from(value);
            }
        }
        let n = batch.len() as f32;
        for acc in &mut avg {
            *acc /= n;
        }

        let alpha = self.alpha;
        let ema = self.ema.get_or_insert(avg);
        for (state, target) in ema.iter_mut().zip(avg) {
            *state += alpha * (target - *state);
        }

        quantize(ema)
    }

    /// Latest smoothed sample, or zeros before the first batch.
    pub fn current(&self) -> FilteredSample {
        self.ema.as_ref().map(quantize).unwrap_or([0; CHANNELS])
    }

    /// Unrounded filter state.
    pub fn state(&self) -> Option<[f32; CHANNELS]> {
        self.ema
    }

    /// Forget history; the next batch seeds the average again.
    pub fn reset(&mut self) {
        self.ema = None;
    }
}

fn quantize(values: &[f32; CHANNELS]) -> FilteredSample {
    values.map(|v| libm::roundf(v).clamp(0.0, f32::from(u16::MAX)) as u16)
}
