//! Three-channel reflectance array for the Tracer robot.
//!
//! Uses ADC1 to read analog values from each sensor.
//! Lower values = less light reflected (dark tape)
//! Higher values = more light reflected (light floor)
//!
//! Pin Mapping (ADC1 channels):
//! - Left:   PA0 (ADC1_IN0)
//! - Center: PA1 (ADC1_IN1)
//! - Right:  PA4 (ADC1_IN4)

use core::convert::Infallible;

use embassy_stm32::adc::Adc;
use embassy_stm32::peripherals::{ADC1, PA0, PA1, PA4};
use tracer_core::sim::SimulatedSensor;
use tracer_core::{RawSample, SensorSource};

/// Reflectance array read through ADC1.
pub struct LineSensors<'d> {
    adc: Adc<'d, ADC1>,
    pin_left: PA0,
    pin_center: PA1,
    pin_right: PA4,
}

impl<'d> LineSensors<'d> {
    /// Create a new line sensor array with ADC.
    pub fn new(adc: Adc<'d, ADC1>, pa0: PA0, pa1: PA1, pa4: PA4) -> Self {
        Self {
            adc,
            pin_left: pa0,
            pin_center: pa1,
            pin_right: pa4,
        }
    }

    /// Read all 3 sensors and return raw ADC values (0-4095), leftmost first.
    pub fn read_all(&mut self) -> RawSample {
        [
            self.adc.blocking_read(&mut self.pin_left),
            self.adc.blocking_read(&mut self.pin_center),
            self.adc.blocking_read(&mut self.pin_right),
        ]
    }
}

impl SensorSource for LineSensors<'_> {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
        Ok(self.read_all())
    }
}

/// Sensor input chosen once at startup.
pub enum SensorInput<'d> {
    /// Real reflectance array
    Adc(LineSensors<'d>),
    /// Virtual line, for bench runs with the wheels off the ground
    Simulated(SimulatedSensor),
}

impl SensorSource for SensorInput<'_> {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
        match self {
            SensorInput::Adc(sensors) => sensors.read_raw(),
            SensorInput::Simulated(sim) => sim.read_raw(),
        }
    }
}
