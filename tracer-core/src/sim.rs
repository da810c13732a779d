//! Hardware-free stand-ins for bench runs and tests
//!
//! - [`SimulatedSensor`]: renders three reflectance readings from a virtual line
//! - [`SimulatedDrive`]: records the last steering and drive command
//! - [`SimClock`]: virtual time that advances only when something sleeps

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::traits::{Actuator, Clock, SensorSource};
use crate::types::{CHANNELS, RawSample};

/// Full scale of a 12-bit ADC.
pub const ADC_MAX: u16 = 4095;

/// Lateral position of each sensor in line-position units (left = +1).
const SENSOR_POSITIONS: [f32; CHANNELS] = [1.0, 0.0, -1.0];

/// Virtual line under a three-sensor array.
///
/// A sensor reads `line_level` when centered over the line and fades linearly
/// to `background` at `half_width` away from it. Uniform noise comes from a
/// seeded RNG so runs are reproducible.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    line: Option<f32>,
    half_width: f32,
    background: u16,
    line_level: u16,
    noise: u16,
    rng: SmallRng,
    reads: u64,
}

impl SimulatedSensor {
    /// Dark tape centered under the array on a light floor.
    pub fn new(seed: u64) -> Self {
        Self {
            line: Some(0.0),
            half_width: 0.75,
            background: 1400,
            line_level: 300,
            noise: 8,
            rng: SmallRng::seed_from_u64(seed),
            reads: 0,
        }
    }

    /// Floor and line intensities in ADC counts.
    pub fn with_levels(mut self, background: u16, line_level: u16) -> Self {
        self.background = background.min(ADC_MAX);
        self.line_level = line_level.min(ADC_MAX);
        self
    }

    /// Uniform noise amplitude in ADC counts (0 disables noise).
    pub fn with_noise(mut self, amplitude: u16) -> Self {
        self.noise = amplitude;
        self
    }

    pub fn with_half_width(mut self, half_width: f32) -> Self {
        self.half_width = half_width.max(f32::EPSILON);
        self
    }

    /// Move the line, or hide it with `None`.
    pub fn set_line(&mut self, position: Option<f32>) {
        self.line = position;
    }

    pub fn line(&self) -> Option<f32> {
        self.line
    }

    /// Reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    fn render(&mut self) -> RawSample {
        let background = f32::from(self.background);
        let line_level = f32::from(self.line_level);
        let noise = i32::from(self.noise);

        let mut sample = [0u16; CHANNELS];
        for (value, position) in sample.iter_mut().zip(SENSOR_POSITIONS) {
            let coverage = self.line.map_or(0.0, |line| {
                (1.0 - libm::fabsf(position - line) / self.half_width).max(0.0)
            });
            let clean = background + (line_level - background) * coverage;
            let jitter = if noise > 0 {
                self.rng.gen_range(-noise..=noise) as f32
            } else {
                0.0
            };
            *value = libm::roundf(clean + jitter).clamp(0.0, f32::from(ADC_MAX)) as u16;
        }
        sample
    }
}

impl SensorSource for SimulatedSensor {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
        self.reads += 1;
        Ok(self.render())
    }
}

/// Actuator that keeps the latest command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulatedDrive {
    /// Steering angle (degrees)
    pub angle: f32,
    /// Drive power, negative when reversing
    pub power: i16,
    /// Number of stop commands received
    pub stops: u32,
}

impl Actuator for SimulatedDrive {
    fn set_steering_angle(&mut self, degrees: f32) {
        self.angle = degrees;
    }

    fn drive_forward(&mut self, power: u8) {
        self.power = i16::from(power.min(100));
    }

    fn drive_backward(&mut self, power: u8) {
        self.power = -i16::from(power.min(100));
    }

    fn stop(&mut self) {
        self.power = 0;
        self.stops += 1;
    }
}

/// Virtual clock and delay.
///
/// Time moves only through [`SimClock::advance_us`] or an awaited delay, so
/// loop timing can be checked without sleeping.
#[derive(Debug, Default)]
pub struct SimClock {
    now_ns: Cell<u64>,
    slept_ns: Cell<u64>,
    sleeps: Cell<u32>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let time pass without counting it as a sleep, e.g. processing cost.
    pub fn advance_us(&self, us: u64) {
        self.now_ns.set(self.now_ns.get() + us * 1_000);
    }

    /// Total time spent in delays (microseconds).
    pub fn slept_us(&self) -> u64 {
        self.slept_ns.get() / 1_000
    }

    /// Number of delays awaited.
    pub fn sleeps(&self) -> u32 {
        self.sleeps.get()
    }

    fn sleep_ns(&self, ns: u32) {
        let ns = u64::from(ns);
        self.now_ns.set(self.now_ns.get() + ns);
        self.slept_ns.set(self.slept_ns.get() + ns);
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.now_ns.get() / 1_000
    }
}

impl Clock for &SimClock {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

impl DelayNs for SimClock {
    async fn delay_ns(&mut self, ns: u32) {
        self.sleep_ns(ns);
    }
}

impl DelayNs for &SimClock {
    async fn delay_ns(&mut self, ns: u32) {
        (**self).sleep_ns(ns);
    }
}
