#![no_std]
#![no_main]

//! Sensor debug mode: prints raw, filtered and estimated values at 2 Hz.
//!
//! Slide the robot across the tape and watch the contrast to tune
//! `contrast_on` / `contrast_off` for the floor at hand.

use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::Config;
use embassy_time::Timer;
use tracer_core::{LineEstimator, SampleFilter, TracerConfig};
use {defmt_rtt as _, panic_probe as _};

defmt::timestamp!("{=u64}", { embassy_time::Instant::now().as_millis() });

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_stm32::init(Config::default());

    info!("=== Sensor Debug Mode ===");

    // LED for visual feedback
    let mut led = Output::new(p.PA5, Level::Low, Speed::Low);

    let config = TracerConfig::default();
    let (mut filter, mut estimator) = match (
        SampleFilter::new(&config.filter),
        LineEstimator::new(&config.estimator),
    ) {
        (Ok(filter), Ok(estimator)) => (filter, estimator),
        (Err(e), _) | (_, Err(e)) => {
            error!("invalid configuration: {}", e);
            return;
        }
    };

    let mut adc = Adc::new(p.ADC1);

    // Same pins as the follower: PA0 left, PA1 center, PA4 right
    let mut pin_left = p.PA0;
    let mut pin_center = p.PA1;
    let mut pin_right = p.PA4;

    info!("ADC initialized, starting sensor readings...");
    info!("Format: raw [L C R] | filtered [L C R] | contrast | estimate");

    loop {
        let raw = [
            adc.blocking_read(&mut pin_left),
            adc.blocking_read(&mut pin_center),
            adc.blocking_read(&mut pin_right),
        ];
        let filtered = filter.filter(&[raw]);
        let (lo, hi) = filtered
            .iter()
            .fold((u16::MAX, u16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let contrast = hi - lo;
        let estimate = estimator.estimate(filtered);

        info!("{} | {} | {} | {}", raw, filtered, contrast, estimate);

        led.toggle();
        Timer::after_millis(500).await;
    }
}
