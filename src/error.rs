use core::fmt::Debug;

use thiserror::Error;

use crate::Level;

pub type Result<T, E = ReadError> = core::result::Result<T, E>;

/// Transient faults on the sensor wire. Absorbed by the caching reader,
/// which falls back to the last good reading.
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadError {
    #[error("GPIO error on the data line")]
    Pin,
    #[error("data line stuck {level:?} for {elapsed_us}us")]
    Timeout { level: Level, elapsed_us: u16 },
    #[error("frame {frame:02x?} carries checksum {received:#04x} but its payload sums to {calculated:#04x}")]
    ChecksumMismatch {
        frame: [u8; 5],
        received: u8,
        calculated: u8,
    },
}

/// Faults during construction. These are fatal: there is no sensor to fall
/// back to, so callers log and exit rather than retry.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("no response to the start handshake on the data pin: {0}")]
    SensorHandshake(#[source] ReadError),
}

/// Faults raised by the display or pump collaborators during one control
/// iteration. Caught at the loop boundary, never fatal.
#[derive(Error, Debug)]
pub enum ControlError<DE: Debug, PE: Debug> {
    #[error("display update failed: {0:?}")]
    Display(DE),
    #[error("pump switch failed: {0:?}")]
    Pump(PE),
}
