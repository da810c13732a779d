//! Platform services injected into the control core.
//!
//! Firmware implements these over the ADC, PWM timers and embassy-time;
//! [`crate::sim`] implements them for host runs. Delays use
//! [`embedded_hal_async::delay::DelayNs`] directly.

use crate::types::RawSample;

/// Source of raw three-channel reflectance readings.
pub trait SensorSource {
    /// Acquisition failure, passed through the control loop unchanged
    type Error;

    /// Read all three channels once, leftmost first.
    fn read_raw(&mut self) -> Result<RawSample, Self::Error>;
}

impl<S: SensorSource + ?Sized> SensorSource for &mut S {
    type Error = S::Error;

    fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
        (**self).read_raw()
    }
}

/// Steering servo and drive motor.
pub trait Actuator {
    /// Steering angle in degrees, positive = left
    fn set_steering_angle(&mut self, degrees: f32);

    /// Drive forward at `power` percent (0-100)
    fn drive_forward(&mut self, power: u8);

    /// Drive backward at `power` percent (0-100)
    fn drive_backward(&mut self, power: u8);

    /// Remove drive power
    fn stop(&mut self);
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
    fn set_steering_angle(&mut self, degrees: f32) {
        (**self).set_steering_angle(degrees);
    }

    fn drive_forward(&mut self, power: u8) {
        (**self).drive_forward(power);
    }

    fn drive_backward(&mut self, power: u8) {
        (**self).drive_backward(power);
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

/// Monotonic time source.
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin
    fn now_us(&self) -> u64;
}
