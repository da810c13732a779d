//! Per-tick data passed along the control chain.

/// Number of reflectance channels (left, center, right).
pub const CHANNELS: usize = 3;

/// Raw ADC readings, index 0 = leftmost.
pub type RawSample = [u16; CHANNELS];

/// Smoothed readings at the sensor's native resolution.
pub type FilteredSample = [u16; CHANNELS];

/// Guard for near-zero denominators.
pub const EPSILON: f32 = 1e-6;

/// Line tracking mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Line signal is strong enough to estimate an offset
    Track,
    /// No usable line signal
    #[default]
    Lost,
}

/// Output of the line estimator for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineEstimate {
    /// Lateral offset in [-1, 1], positive = line is left of the robot
    pub offset: f32,
    /// Signal strength in [0, 1]
    pub confidence: f32,
    /// Tracking mode
    pub mode: Mode,
}

/// Steering and speed command for the actuation interface.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveCommand {
    /// Steering angle in degrees, positive = left
    pub angle: f32,
    /// Forward drive power (0-100)
    pub speed: u8,
}

/// Observability record emitted once per tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickRecord {
    /// Most recent raw read of the oversampled batch
    pub raw: RawSample,
    /// Filter output fed to the estimator
    pub filtered: FilteredSample,
    /// Estimated line offset, positive = left
    pub offset: f32,
    /// Line confidence in [0, 1]
    pub confidence: f32,
    /// Estimator mode after this tick
    pub mode: Mode,
    /// Commanded steering angle in degrees
    pub angle: f32,
    /// Commanded forward power (0-100)
    pub speed: u8,
}

impl TickRecord {
    /// The command that was sent to the actuators this tick.
    pub fn command(&self) -> DriveCommand {
        DriveCommand {
            angle: self.angle,
            speed: self.speed,
        }
    }
}

/// Snap values within `band` of zero to exactly zero.
pub(crate) fn deadband(value: f32, band: f32) -> f32 {
    if libm::fabsf(value) < band { 0.0 } else { value }
}
