pub mod clock;
pub mod control;
pub mod error;
pub mod reader;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::error::{InitError, ReadError, Result};
use crate::reader::HumiditySensor;

pub mod prelude {
    pub use super::{
        clock::Clock, clock::SystemClock, control::Controller, control::Pump,
        control::StatusDisplay, reader::HumiditySensor, reader::SensorReader, Dht22, Level,
        Reading,
    };
}

// Single-wire timings, all in microseconds. The start pulse must exceed 1ms
// for the sensor to notice it; everything after that is the sensor driving
// the line.
const START_PULL_LOW_US: u16 = 1_100;
const START_RELEASE_US: u16 = 40;
const RESPONSE_TIMEOUT_US: u16 = 85;
const BIT_START_TIMEOUT_US: u16 = 55;
const BIT_HIGH_TIMEOUT_US: u16 = 75;

// High phases longer than this encode a one
const BIT_ONE_THRESHOLD_US: u16 = 40;

const FRAME_BITS: usize = 40;

/// The temperature and humidity sensor on its single-wire bus
#[derive(Clone, Debug)]
pub struct Dht22<P, D> {
    pin: P,
    delay: D,
    frame: [u8; 5],
}

/// Represents the reading gotten from the sensor
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Percent relative humidity
    pub humidity: f32,
}

/// State of the single-wire data line
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

fn merge_bytes(a: u8, b: u8) -> u16 {
    ((a as u16) << 8) | b as u16
}

fn sum_frame(frame: &[u8; 5]) -> u8 {
    frame[..4].iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

fn verify_frame(frame: &[u8; 5]) -> Result<()> {
    let calculated = sum_frame(frame);
    if calculated != frame[4] {
        return Err(ReadError::ChecksumMismatch {
            frame: *frame,
            received: frame[4],
            calculated,
        });
    }

    Ok(())
}

fn decode_humidity(frame: &[u8; 5]) -> f32 {
    merge_bytes(frame[0], frame[1]) as f32 / 10.0
}

fn decode_temperature(frame: &[u8; 5]) -> f32 {
    let magnitude = merge_bytes(frame[2] & 0x7F, frame[3]) as f32 / 10.0;

    // Bit 15 of the raw word is a sign flag, not a two's complement bit
    if frame[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

impl<P, D, E> Dht22<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u16>,
{
    /// Create a new sensor bound to its open-drain data pin.
    /// The line idles high, so the pin must carry a pull-up.
    pub fn new(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            frame: [0; 5],
        }
    }

    /// Create a new sensor and run one measurement to confirm something
    /// answers the start handshake
    pub fn probe(pin: P, delay: D) -> Result<Self, InitError> {
        let mut sensor = Self::new(pin, delay);
        sensor.measure().map_err(InitError::SensorHandshake)?;
        Ok(sensor)
    }

    fn level(&self) -> Result<Level> {
        if self.pin.is_high().map_err(|_| ReadError::Pin)? {
            Ok(Level::High)
        } else {
            Ok(Level::Low)
        }
    }

    /// Counts how long the line holds `level`, one poll per microsecond
    fn hold_time(&mut self, level: Level, timeout_us: u16) -> Result<u16> {
        let mut elapsed_us = 0;
        while self.level()? == level {
            if elapsed_us >= timeout_us {
                return Err(ReadError::Timeout { level, elapsed_us });
            }
            elapsed_us += 1;
            self.delay.delay_us(1);
        }

        Ok(elapsed_us)
    }

    fn read_frame(&mut self) -> Result<[u8; 5]> {
        // Start signal: hold the line low, then hand it back to the sensor
        self.pin.set_low().map_err(|_| ReadError::Pin)?;
        self.delay.delay_us(START_PULL_LOW_US);
        self.pin.set_high().map_err(|_| ReadError::Pin)?;
        self.delay.delay_us(START_RELEASE_US);

        // Presence handshake: ~80us low followed by ~80us high
        self.hold_time(Level::Low, RESPONSE_TIMEOUT_US)?;
        self.hold_time(Level::High, RESPONSE_TIMEOUT_US)?;

        let mut frame = [0u8; 5];
        for bit in 0..FRAME_BITS {
            self.hold_time(Level::Low, BIT_START_TIMEOUT_US)?;
            let high_us = self.hold_time(Level::High, BIT_HIGH_TIMEOUT_US)?;
            if high_us > BIT_ONE_THRESHOLD_US {
                frame[bit / 8] |= 1 << (7 - bit % 8);
            }
        }

        verify_frame(&frame)?;
        Ok(frame)
    }
}

impl<P, D, E> HumiditySensor for Dht22<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u16>,
{
    /// Trigger a measurement and latch its frame
    fn measure(&mut self) -> Result<()> {
        self.frame = self.read_frame()?;
        Ok(())
    }

    fn temperature(&self) -> f32 {
        decode_temperature(&self.frame)
    }

    fn humidity(&self) -> f32 {
        decode_humidity(&self.frame)
    }
}
