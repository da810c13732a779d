//! Fixed-cadence control loop.
//!
//! One tick: oversampled read -> filter -> estimate -> step -> actuate. The
//! loop then waits out the rest of the period. An overrun tick starts the next
//! one immediately and skipped ticks are never replayed.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal_async::delay::DelayNs;

use crate::config::{MAX_OVERSAMPLE, TracerConfig};
use crate::controller::MotionController;
use crate::error::{ConfigError, LoopError};
use crate::estimator::LineEstimator;
use crate::filter::SampleFilter;
use crate::traits::{Actuator, Clock, SensorSource};
use crate::types::{CHANNELS, DriveCommand, TickRecord};

/// The sensor-to-actuator pipeline and its pacing.
#[derive(Debug, Clone)]
pub struct ControlLoop {
    filter: SampleFilter,
    estimator: LineEstimator,
    controller: MotionController,
    oversample: usize,
    period_s: f32,
    ticks: u64,
}

impl ControlLoop {
    /// Build every stage from one validated configuration.
    pub fn new(config: &TracerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            filter: SampleFilter::new(&config.filter)?,
            estimator: LineEstimator::new(&config.estimator)?,
            controller: MotionController::new(&config.controller)?,
            oversample: config.filter.oversample,
            period_s: config.period_s,
            ticks: 0,
        })
    }

    /// Control period in microseconds.
    pub fn period_us(&self) -> u64 {
        (f64::from(self.period_s) * 1e6) as u64
    }

    /// Ticks completed since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn estimator(&self) -> &LineEstimator {
        &self.estimator
    }

    pub fn controller(&self) -> &MotionController {
        &self.controller
    }

    /// Return every stage to its power-on state. The tick count is kept.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.estimator.reset();
        self.controller.reset();
    }

    /// Run the pipeline once without touching the actuators.
    ///
    /// A failed read aborts the tick before any stage state changes.
    pub fn tick<S: SensorSource>(&mut self, sensor: &mut S) -> Result<TickRecord, S::Error> {
        let mut batch = [[0u16; CHANNELS]; MAX_OVERSAMPLE];
        for slot in batch.iter_mut().take(self.oversample) {
            *slot = sensor.read_raw()?;
        }
        let batch = &batch[..self.oversample];

        let filtered = self.filter.filter(batch);
        let estimate = self.estimator.estimate(filtered);
        let command = self.controller.step(&estimate, self.period_s);
        self.ticks += 1;

        Ok(TickRecord {
            raw: batch[batch.len() - 1],
            filtered,
            offset: estimate.offset,
            confidence: estimate.confidence,
            mode: estimate.mode,
            angle: command.angle,
            speed: command.speed,
        })
    }

    /// Run until `cancel` is set or the sensor fails.
    ///
    /// Every stage is reset on entry, matching the centered steering left by
    /// the previous run. `cancel` is checked between ticks. Every exit path
    /// stops the drive and recenters the steering before returning. `on_tick` receives each tick's
    /// record after its command has been applied.
    pub async fn run<S, A, T, F>(
        &mut self,
        sensor: &mut S,
        actuator: &mut A,
        timer: &mut T,
        cancel: &AtomicBool,
        mut on_tick: F,
    ) -> Result<(), LoopError<S::Error>>
    where
        S: SensorSource,
        A: Actuator,
        T: Clock + DelayNs,
        F: FnMut(&TickRecord),
    {
        self.reset();
        info!("control loop started, period {} us", self.period_us());

        let result = self
            .cycle(sensor, actuator, timer, cancel, &mut on_tick)
            .await;

        actuator.stop();
        actuator.set_steering_angle(0.0);

        match &result {
            Ok(()) => info!("control loop cancelled after {} ticks", self.ticks),
            Err(_) => warn!("control loop aborted after {} ticks", self.ticks),
        }
        result
    }

    async fn cycle<S, A, T, F>(
        &mut self,
        sensor: &mut S,
        actuator: &mut A,
        timer: &mut T,
        cancel: &AtomicBool,
        on_tick: &mut F,
    ) -> Result<(), LoopError<S::Error>>
    where
        S: SensorSource,
        A: Actuator,
        T: Clock + DelayNs,
        F: FnMut(&TickRecord),
    {
        let period_us = self.period_us();

        while !cancel.load(Ordering::Acquire) {
            let started = timer.now_us();

            let record = self.tick(sensor).map_err(LoopError::Acquisition)?;
            apply(actuator, record.command());
            on_tick(&record);

            let elapsed = timer.now_us().saturating_sub(started);
            if elapsed < period_us {
                let remaining = u32::try_from(period_us - elapsed).unwrap_or(u32::MAX);
                timer.delay_us(remaining).await;
            }
        }
        Ok(())
    }
}

fn apply<A: Actuator>(actuator: &mut A, command: DriveCommand) {
    actuator.set_steering_angle(command.angle);
    if command.speed == 0 {
        actuator.stop();
    } else {
        actuator.drive_forward(command.speed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimulatedDrive, SimulatedSensor};
    use crate::types::Mode;
    use embassy_futures::block_on;

    /// Sensor that fails after a fixed number of reads.
    struct FailingSensor {
        remaining: u32,
    }

    impl SensorSource for FailingSensor {
        type Error = &'static str;

        fn read_raw(&mut self) -> Result<[u16; 3], Self::Error> {
            if self.remaining == 0 {
                return Err("adc timeout");
            }
            self.remaining -= 1;
            Ok([300, 1400, 1400])
        }
    }

    /// Cancels the loop after a number of ticks from inside the callback.
    fn cancel_after(cancel: &AtomicBool, ticks: u64) -> impl FnMut(&TickRecord) + '_ {
        let mut seen = 0;
        move |_: &TickRecord| {
            seen += 1;
            if seen >= ticks {
                cancel.store(true, Ordering::Release);
            }
        }
    }

    #[test]
    fn test_tick_reads_oversample_batch() {
        let mut control = ControlLoop::new(&TracerConfig::default()).unwrap();
        let mut sensor = SimulatedSensor::new(7).with_noise(0);
        let record = control.tick(&mut sensor).unwrap();
        assert_eq!(sensor.reads(), 3);
        assert_eq!(record.raw, record.filtered);
        assert_eq!(control.ticks(), 1);
    }

    #[test]
    fn test_failed_read_leaves_state_untouched() {
        let mut control = ControlLoop::new(&TracerConfig::default()).unwrap();
        let mut sensor = FailingSensor { remaining: 2 };
        assert_eq!(control.tick(&mut sensor), Err("adc timeout"));
        assert_eq!(control.ticks(), 0);
        assert_eq!(control.estimator().mode(), Mode::Lost);
    }

    #[test]
    fn test_run_holds_cadence() {
        let mut control = ControlLoop::new(&TracerConfig::default()).unwrap();
        let mut sensor = SimulatedSensor::new(1);
        let mut drive = SimulatedDrive::default();
        let mut clock = SimClock::new();
        let cancel = AtomicBool::new(false);

        let result = block_on(control.run(
            &mut sensor,
            &mut drive,
            &mut clock,
            &cancel,
            cancel_after(&cancel, 10),
        ));

        assert!(result.is_ok());
        assert_eq!(control.ticks(), 10);
        // Zero processing time: every tick sleeps the full 50 ms
        assert_eq!(clock.sleeps(), 10);
        assert_eq!(clock.now_us(), 500_000);
    }

    #[test]
    fn test_overrun_skips_wait_without_catch_up() {
        let clock = SimClock::new();
        let mut control = ControlLoop::new(&TracerConfig::default()).unwrap();
        let mut sensor = SlowSensor {
            clock: &clock,
            cost_us: 30_000,
            inner: SimulatedSensor::new(3),
        };
        let mut drive = SimulatedDrive::default();
        let cancel = AtomicBool::new(false);
        let mut timer = &clock;

        block_on(control.run(
            &mut sensor,
            &mut drive,
            &mut timer,
            &cancel,
            cancel_after(&cancel, 4),
        ))
        .unwrap();

        // Three reads at 30 ms each overrun the 50 ms period: no sleeping at all
        assert_eq!(clock.sleeps(), 0);
        assert_eq!(clock.now_us(), 4 * 90_000);
    }

    #[test]
    fn test_cancelled_before_start_still_parks() {
        let mut control = ControlLoop::new(&TracerConfig::default()).unwrap();
        let mut sensor = SimulatedSensor::new(1);
        let mut drive = SimulatedDrive::default();
        drive.drive_forward(50);
        drive.set_steering_angle(12.0);
        let mut clock = SimClock::new();
        let cancel = AtomicBool::new(true);

        block_on(control.run(&mut sensor, &mut drive, &mut clock, &cancel, |_| {})).unwrap();

        assert_eq!(control.ticks(), 0);
        assert_eq!(drive.power, 0);
        assert_eq!(drive.angle, 0.0);
    }

    #[test]
    fn test_acquisition_error_stops_and_recenters() {
        let mut control = ControlLoop::new(&TracerConfig::default()).unwrap();
        let mut sensor = FailingSensor { remaining: 3 * 12 + 1 };
        let mut drive = SimulatedDrive::default();
        let mut clock = SimClock::new();
        let cancel = AtomicBool::new(false);
        let mut last = None;

        let result = block_on(control.run(
            &mut sensor,
            &mut drive,
            &mut clock,
            &cancel,
            |record| last = Some(*record),
        ));

        assert!(matches!(result, Err(LoopError::Acquisition("adc timeout"))));
        assert_eq!(control.ticks(), 12);
        // The line sat under the left sensor, so the robot was steering left
        let last = last.unwrap();
        assert_eq!(last.mode, Mode::Track);
        assert!(last.angle > 0.0);
        assert_eq!(drive.power, 0);
        assert_eq!(drive.angle, 0.0);
        assert!(drive.stops >= 1);
    }

    #[test]
    fn test_restart_begins_from_centered_steering() {
        let mut control = ControlLoop::new(&TracerConfig::default()).unwrap();
        let mut sensor = SimulatedSensor::new(5);
        sensor.set_line(Some(0.8));
        let mut drive = SimulatedDrive::default();
        let mut clock = SimClock::new();
        let cancel = AtomicBool::new(false);

        block_on(control.run(
            &mut sensor,
            &mut drive,
            &mut clock,
            &cancel,
            cancel_after(&cancel, 40),
        ))
        .unwrap();
        assert!(control.controller().state().previous_angle > 9.0);
        assert_eq!(drive.angle, 0.0);

        cancel.store(false, Ordering::Release);
        let mut first = None;
        block_on(control.run(&mut sensor, &mut drive, &mut clock, &cancel, |record| {
            first = Some(*record);
            cancel.store(true, Ordering::Release);
        }))
        .unwrap();

        // The wheels were recentered, so the first step is slew-bounded from zero
        let first = first.unwrap();
        assert!(first.angle.abs() <= 180.0 * 0.05 + 1e-4);
        assert_eq!(control.ticks(), 41);
    }

    struct SlowSensor<'a> {
        clock: &'a SimClock,
        cost_us: u64,
        inner: SimulatedSensor,
    }

    impl SensorSource for SlowSensor<'_> {
        type Error = core::convert::Infallible;

        fn read_raw(&mut self) -> Result<[u16; 3], Self::Error> {
            self.clock.advance_us(self.cost_us);
            self.inner.read_raw()
        }
    }
}
