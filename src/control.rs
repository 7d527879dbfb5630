use core::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::clock::Clock;
use crate::error::ControlError;
use crate::reader::{HumiditySensor, SensorReader};
use crate::Reading;

/// The pump runs whenever relative humidity drops below this
pub const HUMIDITY_THRESHOLD: f32 = 40.0;

/// Pause between control iterations
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Pause after a failed iteration before trying again
pub const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Shows readings to whoever is watching. The controller only propagates
/// failures, it never inspects what the display did with a reading.
pub trait StatusDisplay {
    type Error;

    fn update(&mut self, reading: &Reading) -> Result<(), Self::Error>;
}

/// The water pump relay
pub trait Pump {
    type Error;

    fn on(&mut self) -> Result<(), Self::Error>;
    fn off(&mut self) -> Result<(), Self::Error>;
}

/// Polls the reader and drives the display and pump from each reading
pub struct Controller<S, C, D, P> {
    reader: SensorReader<S, C>,
    display: D,
    pump: P,
    clock: C,
}

impl<S, C, D, P> Controller<S, C, D, P>
where
    S: HumiditySensor,
    C: Clock,
    D: StatusDisplay,
    P: Pump,
    D::Error: Debug,
    P::Error: Debug,
{
    pub fn new(reader: SensorReader<S, C>, display: D, pump: P, clock: C) -> Self {
        Self {
            reader,
            display,
            pump,
            clock,
        }
    }

    /// One control pass: read, show, switch. Split out from [`run`] so a
    /// single step can be driven deterministically.
    pub fn run_iteration(&mut self) -> Result<Reading, ControlError<D::Error, P::Error>> {
        let reading = self.reader.read();
        self.display.update(&reading).map_err(ControlError::Display)?;

        if reading.humidity < HUMIDITY_THRESHOLD {
            self.pump.on().map_err(ControlError::Pump)?;
        } else {
            self.pump.off().map_err(ControlError::Pump)?;
        }

        Ok(reading)
    }

    /// Run until `stop` is raised. Iteration faults are logged and absorbed
    /// with an extended backoff; nothing past construction brings the loop
    /// down.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            match self.run_iteration() {
                Ok(reading) => {
                    log::debug!("{:.1}C {:.1}%RH", reading.temperature, reading.humidity);
                    self.clock.sleep(POLL_INTERVAL);
                }
                Err(err) => {
                    log::error!("iteration failed: {err}");
                    self.clock.sleep(ERROR_BACKOFF);
                }
            }
        }
    }
}
