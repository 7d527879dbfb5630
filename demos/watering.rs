//! Simulated run of the watering controller: a scripted bench sensor stands
//! in for the DHT22 so the loop can be watched without hardware.
//!
//! ```sh
//! RUST_LOG=debug cargo run --example watering
//! ```

use std::convert::Infallible;
use std::sync::atomic::AtomicBool;

use hygrostat::control::HUMIDITY_THRESHOLD;
use hygrostat::error::{ReadError, Result};
use hygrostat::prelude::*;

/// Drifts through wet and dry spells, with the wire glitching every
/// seventh sample
struct BenchSensor {
    tick: u32,
    temperature: f32,
    humidity: f32,
}

impl BenchSensor {
    fn new() -> Self {
        Self {
            tick: 0,
            temperature: 21.5,
            humidity: 48.0,
        }
    }
}

impl HumiditySensor for BenchSensor {
    fn measure(&mut self) -> Result<()> {
        self.tick += 1;
        if self.tick % 7 == 0 {
            return Err(ReadError::Timeout {
                level: Level::High,
                elapsed_us: 75,
            });
        }

        self.humidity = 40.0 + 12.0 * (self.tick as f32 / 5.0).sin();
        self.temperature = 21.5 + 0.25 * (self.tick as f32 / 9.0).cos();
        Ok(())
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn humidity(&self) -> f32 {
        self.humidity
    }
}

struct ConsoleDisplay;

impl StatusDisplay for ConsoleDisplay {
    type Error = Infallible;

    fn update(&mut self, reading: &Reading) -> Result<(), Infallible> {
        println!("{:5.1}C  {:5.1}%RH", reading.temperature, reading.humidity);
        Ok(())
    }
}

/// Logs relay edges instead of toggling a GPIO
struct RelayPump {
    running: bool,
}

impl Pump for RelayPump {
    type Error = Infallible;

    fn on(&mut self) -> Result<(), Infallible> {
        if !self.running {
            log::info!("pump on");
            self.running = true;
        }
        Ok(())
    }

    fn off(&mut self) -> Result<(), Infallible> {
        if self.running {
            log::info!("pump off");
            self.running = false;
        }
        Ok(())
    }
}

fn main() {
    env_logger::init();

    let clock = SystemClock::new();
    let reader = SensorReader::new(BenchSensor::new(), clock);
    let mut controller = Controller::new(
        reader,
        ConsoleDisplay,
        RelayPump { running: false },
        clock,
    );

    log::info!("watering controller up, pump threshold {HUMIDITY_THRESHOLD}%RH");

    let stop = AtomicBool::new(false);
    controller.run(&stop);
}
