#![no_std]
#![no_main]

mod bluetooth;
mod motors;
mod sensors;
mod timer;

use core::future::Future;
use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{debug, error, info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_stm32::bind_interrupts;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::usart::{Config as UartConfig, Uart};
use embassy_stm32::Config;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Timer;
use {defmt_rtt as _, panic_probe as _};

use tracer_core::maneuver::{self, Maneuver, ManeuverConfig};
use tracer_core::teleop::{self, TeleopAction, TeleopConfig};
use tracer_core::{Actuator, ControlLoop, LoopError, TracerConfig};

use bluetooth::{Bluetooth, Command};
use motors::DriveTrain;
use sensors::SensorInput;
use timer::EmbassyTimer;

bind_interrupts!(struct Irqs {
    USART6 => embassy_stm32::usart::InterruptHandler<embassy_stm32::peripherals::USART6>;
});

defmt::timestamp!("{=u64}", { embassy_time::Instant::now().as_millis() });

/// Commands handed from the link task to the main loop.
static COMMANDS: Channel<CriticalSectionRawMutex, Command, 4> = Channel::new();

/// Set by the link task when a new command should preempt the running one.
static CANCEL: AtomicBool = AtomicBool::new(false);

#[embassy_executor::task]
async fn blink_task(mut led: Output<'static>) {
    loop {
        led.toggle();
        Timer::after_millis(500).await;
    }
}

#[embassy_executor::task]
async fn link_task(mut bt: Bluetooth<'static>) {
    let teleop = TeleopConfig::default();
    let mut connected = false;

    loop {
        if !bt.is_connected() {
            connected = false;
            Timer::after_millis(100).await;
            continue;
        }
        if !connected {
            connected = true;
            info!("Operator connected");
            let _ = bt.send_connected().await;
        }

        let command = match bt.read_command().await {
            Ok(command) => command,
            Err(e) => {
                warn!("link read failed: {}", defmt::Debug2Format(&e));
                continue;
            }
        };

        match command {
            Command::Ping => {
                let _ = bt.send_pong().await;
            }
            Command::BadManeuver(code) => warn!("unknown maneuver code {}", code),
            Command::Key(key) if teleop::action_for_key(key, &teleop).is_none() => {
                debug!("ignored key {=u8:#x}", key);
            }
            Command::Follow => COMMANDS.send(command).await,
            _ => {
                CANCEL.store(true, Ordering::Release);
                COMMANDS.send(command).await;
                // The main loop may have drained and cleared while the queue was full
                CANCEL.store(true, Ordering::Release);
            }
        }
    }
}

/// Resolves once `CANCEL` is raised.
async fn cancelled() {
    while !CANCEL.load(Ordering::Acquire) {
        Timer::after_millis(10).await;
    }
}

/// Run `motion` to completion unless a newer command cancels it first.
/// Returns false when interrupted.
async fn until_cancelled(motion: impl Future<Output = ()>) -> bool {
    matches!(select(motion, cancelled()).await, Either::First(()))
}

fn park(drive: &mut DriveTrain<'_>) {
    drive.stop();
    drive.set_steering_angle(0.0);
}

async fn run_maneuver(which: Maneuver, drive: &mut DriveTrain<'_>, config: &ManeuverConfig) {
    let mut timer = EmbassyTimer;
    if !until_cancelled(maneuver::perform(which, &mut *drive, &mut timer, config)).await {
        warn!("maneuver {} interrupted", which);
        park(drive);
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(Config::default());

    info!("=== Tracer Line Follower ===");

    let config = TracerConfig::default();
    let mut control = match ControlLoop::new(&config) {
        Ok(control) => control,
        Err(e) => {
            error!("invalid configuration: {}", e);
            loop {
                Timer::after_secs(1).await;
            }
        }
    };

    // LED blink task
    let led = Output::new(p.PA5, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(blink_task(led)));

    // TIM1: PA8=drive fwd, PA9=drive rev; TIM3: PA6=steering servo
    let max_angle = config.controller.max_angle;
    let mut drive = DriveTrain::new(p.TIM1, p.PA8, p.PA9, p.TIM3, p.PA6, max_angle);
    info!("Drive train initialized, steering limit {} deg", max_angle);

    #[cfg(not(feature = "simulated-sensor"))]
    let mut sensors = {
        let adc = embassy_stm32::adc::Adc::new(p.ADC1);
        SensorInput::Adc(sensors::LineSensors::new(adc, p.PA0, p.PA1, p.PA4))
    };
    #[cfg(feature = "simulated-sensor")]
    let mut sensors = SensorInput::Simulated(tracer_core::sim::SimulatedSensor::new(0x7ACE));
    info!("Sensors initialized");

    // Initialize Bluetooth (USART6)
    // PC6=TX, PC7=RX, PB6=STATE
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = 9600; // HC-05 default baud rate

    let uart = unwrap!(Uart::new(
        p.USART6,
        p.PC7,  // RX
        p.PC6,  // TX
        Irqs,
        p.DMA2_CH6, // TX DMA
        p.DMA2_CH1, // RX DMA
        uart_config,
    ));

    let state_pin = Input::new(p.PB6, Pull::Down);
    unwrap!(spawner.spawn(link_task(Bluetooth::new(uart, state_pin))));
    info!("Bluetooth initialized (9600 baud)");

    let mut timer = EmbassyTimer;
    let maneuvers = ManeuverConfig {
        max_angle,
        ..ManeuverConfig::default()
    };
    let teleop = TeleopConfig::default();

    info!("Ready! Waiting for commands...");

    loop {
        // Anything older than the newest queued command was already preempted.
        // The link task raises CANCEL after queueing without yielding, so once
        // the queue is empty every raise has been consumed.
        let mut command = COMMANDS.receive().await;
        while let Ok(newer) = COMMANDS.try_receive() {
            debug!("{} superseded by {}", command, newer);
            command = newer;
        }
        CANCEL.store(false, Ordering::Release);

        match command {
            Command::Follow => {
                let result = control
                    .run(&mut sensors, &mut drive, &mut timer, &CANCEL, |record| {
                        debug!("{}", record)
                    })
                    .await;
                match result {
                    Ok(()) => info!("Follower stopped after {} ticks", control.ticks()),
                    Err(LoopError::Acquisition(never)) => match never {},
                }
            }
            Command::Drive { speed, steer } => {
                drive.set_steering_angle(f32::from(steer));
                drive.set_power(speed);
            }
            Command::Stop => {
                park(&mut drive);
                info!("Stopped");
            }
            Command::Maneuver(which) => run_maneuver(which, &mut drive, &maneuvers).await,
            Command::Key(key) => match teleop::action_for_key(key, &teleop) {
                Some(TeleopAction::Drive { speed, steering_deg, duration_ms }) => {
                    let run = maneuver::drive(
                        &mut drive,
                        &mut timer,
                        speed,
                        steering_deg,
                        duration_ms,
                        maneuvers.settle_ms,
                    );
                    if !until_cancelled(run).await {
                        park(&mut drive);
                    }
                }
                Some(TeleopAction::Maneuver(which)) => run_maneuver(which, &mut drive, &maneuvers).await,
                Some(TeleopAction::Stop) => park(&mut drive),
                None => {}
            },
            Command::Ping | Command::BadManeuver(_) => {}
        }
    }
}
