//! Tracer control core for a three-sensor line-following robot.
//!
//! Turns noisy reflectance readings into a steering angle and a drive speed
//! once per control tick:
//!
//! ```text
//! SensorSource -> SampleFilter -> LineEstimator -> MotionController -> Actuator
//! ```
//!
//! Everything here is `no_std` and hardware-free. Platform services (sensor
//! acquisition, actuation, time) come in through the traits in [`traits`]; the
//! firmware crate provides the embassy/STM32 implementations and [`sim`]
//! provides host-side stand-ins.
//!
//! ## Features
//!
//! - `defmt`: derive `defmt::Format` on public types and log mode transitions

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod config;
pub mod control_loop;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod filter;
pub mod maneuver;
pub mod sim;
pub mod teleop;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{ControllerConfig, EstimatorConfig, FilterConfig, Polarity, TracerConfig};
pub use control_loop::ControlLoop;
pub use controller::{ControllerState, MotionController};
pub use error::{ConfigError, LoopError};
pub use estimator::LineEstimator;
pub use filter::SampleFilter;
pub use traits::{Actuator, Clock, SensorSource};
pub use types::{DriveCommand, FilteredSample, LineEstimate, Mode, RawSample, TickRecord};
