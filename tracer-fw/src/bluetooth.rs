//! HC-05 Bluetooth module driver using USART6
//!
//! Pins:
//! - PC6: TX (to HC-05 RX)
//! - PC7: RX (from HC-05 TX)
//! - PB6: STATE (high when connected)
//!
//! Protocol:
//! - Commands from the operator: [CMD_BYTE, DATA...]
//! - Replies to the operator: [MSG_TYPE, DATA...]
//!
//! Any other byte is a single-key teleop command.

use embassy_stm32::gpio::Input;
use embassy_stm32::mode::Async;
use embassy_stm32::usart::{self, Uart};
use tracer_core::maneuver::Maneuver;

/// Command bytes from the operator
pub mod cmd {
    /// Direct drive: [CMD_DRIVE, speed_i8, steer_deg_i8]
    pub const DRIVE: u8 = 0x01;
    /// Stop the drive and cancel whatever is running
    pub const STOP: u8 = 0x02;
    /// Ping (for connection check)
    pub const PING: u8 = 0x04;
    /// Start line following
    pub const FOLLOW: u8 = 0x06;
    /// Run a scripted maneuver: [CMD_MANEUVER, code]
    pub const MANEUVER: u8 = 0x07;
}

/// Message types to the operator
pub mod msg {
    /// Pong response
    pub const PONG: u8 = 0x11;
    /// Connection established
    pub const CONNECTED: u8 = 0x12;
}

/// Parsed command from the operator
#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum Command {
    /// Drive continuously; speed -100 to 100, steering in degrees (left positive)
    Drive { speed: i8, steer: i8 },
    /// Stop all motion
    Stop,
    /// Ping request
    Ping,
    /// Start the closed-loop follower
    Follow,
    /// Scripted maneuver
    Maneuver(Maneuver),
    /// Maneuver byte that names no maneuver
    BadManeuver(u8),
    /// Single-key teleop byte
    Key(u8),
}

/// HC-05 Bluetooth driver
pub struct Bluetooth<'d> {
    uart: Uart<'d, Async>,
    state_pin: Input<'d>,
}

impl<'d> Bluetooth<'d> {
    /// Create a new Bluetooth driver instance
    pub fn new(uart: Uart<'d, Async>, state_pin: Input<'d>) -> Self {
        Self { uart, state_pin }
    }

    /// Check if a device is connected (STATE pin high)
    pub fn is_connected(&self) -> bool {
        self.state_pin.is_high()
    }

    /// Read a single byte (waits until received)
    pub async fn read_byte(&mut self) -> Result<u8, usart::Error> {
        let mut buf = [0u8; 1];
        self.uart.read(&mut buf).await?;
        Ok(buf[0])
    }

    /// Write bytes to Bluetooth
    pub async fn write(&mut self, data: &[u8]) -> Result<(), usart::Error> {
        self.uart.write(data).await
    }

    /// Send pong response
    pub async fn send_pong(&mut self) -> Result<(), usart::Error> {
        self.write(&[msg::PONG]).await
    }

    /// Send connected notification
    pub async fn send_connected(&mut self) -> Result<(), usart::Error> {
        self.write(&[msg::CONNECTED]).await
    }

    /// Read and parse the next command.
    pub async fn read_command(&mut self) -> Result<Command, usart::Error> {
        let cmd_byte = self.read_byte().await?;

        match cmd_byte {
            cmd::DRIVE => {
                let speed = self.read_byte().await? as i8;
                let steer = self.read_byte().await? as i8;
                Ok(Command::Drive { speed, steer })
            }
            cmd::STOP => Ok(Command::Stop),
            cmd::PING => Ok(Command::Ping),
            cmd::FOLLOW => Ok(Command::Follow),
            cmd::MANEUVER => {
                let code = self.read_byte().await?;
                Ok(Maneuver::from_code(code).map_or(Command::BadManeuver(code), Command::Maneuver))
            }
            other => Ok(Command::Key(other)),
        }
    }
}
