//! Drive train for the Tracer robot.
//!
//! One DC drive motor through an L298N H-bridge and a steering servo.
//!
//! - TIM1 CH1 (PA8): drive motor forward, 20 kHz
//! - TIM1 CH2 (PA9): drive motor reverse, 20 kHz
//! - TIM3 CH1 (PA6): steering servo, 50 Hz

use embedded_hal::Pwm;
use embassy_stm32::gpio::OutputType;
use embassy_stm32::time::hz;
use embassy_stm32::timer::Channel;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::peripherals::{PA6, PA8, PA9, TIM1, TIM3};
use tracer_core::Actuator;

/// PWM frequency for motor control (20kHz - inaudible)
const PWM_FREQUENCY: u32 = 20_000;

/// Standard hobby servo frame rate
const SERVO_FREQUENCY: u32 = 50;

/// Servo frame length at 50 Hz
const SERVO_PERIOD_US: u32 = 20_000;

/// Pulse width with the wheels straight
const SERVO_CENTER_US: f32 = 1500.0;

/// Pulse change per degree of steering (1000 us over 90 deg)
const SERVO_US_PER_DEG: f32 = 1000.0 / 90.0;

/// Motor direction
#[derive(Clone, Copy, Debug, PartialEq, defmt::Format)]
pub enum Direction {
    Forward,
    Reverse,
    Stop,
}

/// Drive motor and steering servo.
pub struct DriveTrain<'d> {
    motor: SimplePwm<'d, TIM1>,
    motor_max_duty: u32,
    servo: SimplePwm<'d, TIM3>,
    servo_max_duty: u32,
    max_angle: f32,
}

impl<'d> DriveTrain<'d> {
    /// Create the drive train with the motor stopped and the wheels centered.
    ///
    /// # Arguments
    /// * `tim1` - TIM1 peripheral (drive motor)
    /// * `pa8` - PWM pin for forward
    /// * `pa9` - PWM pin for reverse
    /// * `tim3` - TIM3 peripheral (steering servo)
    /// * `pa6` - servo signal pin
    /// * `max_angle` - steering limit in degrees
    pub fn new(tim1: TIM1, pa8: PA8, pa9: PA9, tim3: TIM3, pa6: PA6, max_angle: f32) -> Self {
        let pwm_fwd = PwmPin::new_ch1(pa8, OutputType::PushPull);
        let pwm_rev = PwmPin::new_ch2(pa9, OutputType::PushPull);

        let mut motor = SimplePwm::new(
            tim1,
            Some(pwm_fwd),
            Some(pwm_rev),
            None,
            None,
            hz(PWM_FREQUENCY),
            CountingMode::EdgeAlignedUp,
        );
        let motor_max_duty = motor.get_max_duty();
        motor.enable(Channel::Ch1);
        motor.enable(Channel::Ch2);
        motor.set_duty(Channel::Ch1, 0);
        motor.set_duty(Channel::Ch2, 0);

        let servo_pin = PwmPin::new_ch1(pa6, OutputType::PushPull);
        let mut servo = SimplePwm::new(
            tim3,
            Some(servo_pin),
            None,
            None,
            None,
            hz(SERVO_FREQUENCY),
            CountingMode::EdgeAlignedUp,
        );
        let servo_max_duty = servo.get_max_duty();
        servo.enable(Channel::Ch1);

        let mut drive = Self {
            motor,
            motor_max_duty,
            servo,
            servo_max_duty,
            max_angle,
        };
        drive.set_steering_angle(0.0);
        drive
    }

    /// Set motor power and direction.
    ///
    /// # Arguments
    /// * `direction` - Direction of rotation
    /// * `speed_percent` - Power as percentage (0-100)
    pub fn set_motor(&mut self, direction: Direction, speed_percent: u8) {
        let speed = u32::from(speed_percent.min(100));
        let duty = self.motor_max_duty * speed / 100;

        match direction {
            Direction::Forward => {
                self.motor.set_duty(Channel::Ch2, 0);
                self.motor.set_duty(Channel::Ch1, duty);
            }
            Direction::Reverse => {
                self.motor.set_duty(Channel::Ch1, 0);
                self.motor.set_duty(Channel::Ch2, duty);
            }
            Direction::Stop => {
                self.motor.set_duty(Channel::Ch1, 0);
                self.motor.set_duty(Channel::Ch2, 0);
            }
        }
    }

    /// Signed power: positive = forward, negative = reverse, 0 = stop.
    pub fn set_power(&mut self, power: i8) {
        let (direction, percent) = Self::power_to_dir(power);
        self.set_motor(direction, percent);
    }

    /// Convert signed power (-100 to 100) to direction and absolute percentage.
    fn power_to_dir(power: i8) -> (Direction, u8) {
        if power > 0 {
            (Direction::Forward, power.unsigned_abs().min(100))
        } else if power < 0 {
            (Direction::Reverse, power.unsigned_abs().min(100))
        } else {
            (Direction::Stop, 0)
        }
    }

    fn servo_duty(&self, degrees: f32) -> u32 {
        let angle = degrees.clamp(-self.max_angle, self.max_angle);
        let pulse_us = SERVO_CENTER_US + angle * SERVO_US_PER_DEG;
        (self.servo_max_duty as f32 * pulse_us / SERVO_PERIOD_US as f32) as u32
    }
}

impl Actuator for DriveTrain<'_> {
    fn set_steering_angle(&mut self, degrees: f32) {
        let duty = self.servo_duty(degrees);
        self.servo.set_duty(Channel::Ch1, duty);
    }

    fn drive_forward(&mut self, power: u8) {
        self.set_motor(Direction::Forward, power);
    }

    fn drive_backward(&mut self, power: u8) {
        self.set_motor(Direction::Reverse, power);
    }

    fn stop(&mut self) {
        self.set_motor(Direction::Stop, 0);
    }
}
