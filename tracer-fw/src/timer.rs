//! Embassy time driver exposed through the core's clock and delay traits.

use embassy_time::{Instant, Timer};
use embedded_hal_async::delay::DelayNs;
use tracer_core::Clock;

/// Monotonic clock and async delay backed by `embassy_time`.
#[derive(Clone, Copy, Default)]
pub struct EmbassyTimer;

impl Clock for EmbassyTimer {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}

impl DelayNs for EmbassyTimer {
    async fn delay_ns(&mut self, ns: u32) {
        Timer::after_nanos(u64::from(ns)).await
    }

    async fn delay_us(&mut self, us: u32) {
        Timer::after_micros(u64::from(us)).await
    }

    async fn delay_ms(&mut self, ms: u32) {
        Timer::after_millis(u64::from(ms)).await
    }
}
