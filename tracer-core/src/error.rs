//! Error types for Tracer

/// Rejected construction parameter.
///
/// Raised only while building components; the running loop never produces one.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Polarity string was neither "dark" nor "light"
    #[error("polarity must be \"dark\" or \"light\"")]
    InvalidPolarity,

    /// Hysteresis thresholds do not leave a dead zone
    #[error("contrast_off ({off}) must be below contrast_on ({on})")]
    InvertedHysteresis {
        /// Lost -> Track threshold
        on: f32,
        /// Track -> Lost threshold
        off: f32,
    },

    /// Parameter must be strictly positive
    #[error("{name} must be positive, got {value}")]
    NonPositive {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: f32,
    },

    /// Parameter must be zero or positive
    #[error("{name} must not be negative, got {value}")]
    Negative {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: f32,
    },

    /// Parameter falls outside its allowed interval
    #[error("{name} out of range, got {value}")]
    OutOfRange {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: f32,
    },

    /// Drive power above 100
    #[error("{name} must be within 0..=100, got {value}")]
    Speed {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: u8,
    },

    /// Minimum speed above base speed
    #[error("min_speed ({min}) must not exceed base_speed ({base})")]
    SpeedOrdering {
        /// Configured floor
        min: u8,
        /// Configured cruise speed
        base: u8,
    },

    /// Oversample count outside 1..=MAX_OVERSAMPLE
    #[error("oversample count must be within 1..={max}, got {count}")]
    Oversample {
        /// Rejected count
        count: usize,
        /// Upper bound
        max: usize,
    },
}

/// Control loop failure.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopError<E> {
    /// Sensor read failed; the error is passed through unchanged
    #[error("sensor acquisition failed: {0:?}")]
    Acquisition(E),
}
