use std::time::Duration;

use crate::clock::Clock;
use crate::error::Result;
use crate::Reading;

/// The sensor cannot be sampled more often than once every two seconds
pub const MIN_READ_INTERVAL: Duration = Duration::from_secs(2);

/// Served when a read fails before any measurement has succeeded
pub const FALLBACK_READING: Reading = Reading {
    temperature: 25.0,
    humidity: 50.0,
};

/// The hardware half of a reading: trigger a measurement, then fetch the
/// values it latched
pub trait HumiditySensor {
    /// Trigger a measurement, refreshing `temperature` and `humidity`
    fn measure(&mut self) -> Result<()>;

    /// Degrees Celsius from the most recent measurement
    fn temperature(&self) -> f32;

    /// Percent relative humidity from the most recent measurement
    fn humidity(&self) -> f32;
}

/// Wraps a sensor with the bookkeeping needed to poll it freely: reads
/// inside the sampling interval are served from cache, and failed reads
/// degrade to the last good value instead of surfacing
pub struct SensorReader<S, C> {
    sensor: S,
    clock: C,
    last_reading: Option<Reading>,
    last_read_time: Duration,
}

impl<S, C> SensorReader<S, C>
where
    S: HumiditySensor,
    C: Clock,
{
    pub fn new(sensor: S, clock: C) -> Self {
        Self {
            sensor,
            clock,
            last_reading: None,
            last_read_time: Duration::ZERO,
        }
    }

    /// Obtain a reading. Never fails: inside the sampling interval the
    /// cached value is returned without touching the hardware, and a failed
    /// measurement degrades to the last good value, or to
    /// [`FALLBACK_READING`] before the first success.
    pub fn read(&mut self) -> Reading {
        let now = self.clock.now();

        if now.saturating_sub(self.last_read_time) < MIN_READ_INTERVAL {
            if let Some(reading) = self.last_reading {
                return reading;
            }
            // Nothing cached yet: wait out a full interval before the first
            // attempt rather than computing the remainder
            self.clock.sleep(MIN_READ_INTERVAL);
        }

        match self.sample() {
            Ok(reading) => {
                self.last_reading = Some(reading);
                self.last_read_time = now;
                reading
            }
            Err(err) => {
                log::error!("sensor read failed: {err}");
                self.last_reading.unwrap_or(FALLBACK_READING)
            }
        }
    }

    /// Convenience for callers that only want the temperature. Shares
    /// `read`'s cache.
    pub fn temperature(&mut self) -> f32 {
        self.read().temperature
    }

    /// Convenience for callers that only want the humidity. Shares `read`'s
    /// cache.
    pub fn humidity(&mut self) -> f32 {
        self.read().humidity
    }

    fn sample(&mut self) -> Result<Reading> {
        self.sensor.measure()?;
        Ok(Reading {
            temperature: self.sensor.temperature(),
            humidity: self.sensor.humidity(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ReadError;
    use rstest::rstest;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    const GLITCH: ReadError = ReadError::Pin;

    #[derive(Clone, Default)]
    struct ManualClock {
        now: Rc<Cell<Duration>>,
        slept: Rc<RefCell<Vec<Duration>>>,
    }

    impl ManualClock {
        fn at(secs: u64) -> Self {
            let clock = Self::default();
            clock.set(secs);
            clock
        }

        fn set(&self, secs: u64) {
            self.now.set(Duration::from_secs(secs));
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
            self.now.set(self.now.get() + duration);
        }
    }

    struct ScriptedSensor {
        script: VecDeque<Result<(f32, f32)>>,
        latched: (f32, f32),
        attempts: usize,
    }

    impl ScriptedSensor {
        fn new(script: impl IntoIterator<Item = Result<(f32, f32)>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                latched: (0.0, 0.0),
                attempts: 0,
            }
        }
    }

    impl HumiditySensor for ScriptedSensor {
        fn measure(&mut self) -> Result<()> {
            self.attempts += 1;
            let step = self
                .script
                .pop_front()
                .expect("measure called more often than scripted");
            self.latched = step?;
            Ok(())
        }

        fn temperature(&self) -> f32 {
            self.latched.0
        }

        fn humidity(&self) -> f32 {
            self.latched.1
        }
    }

    #[test]
    fn cached_inside_min_interval() {
        let clock = ManualClock::at(10);
        let sensor = ScriptedSensor::new([Ok((21.0, 55.0)), Ok((22.0, 60.0))]);
        let mut reader = SensorReader::new(sensor, clock.clone());

        let first = reader.read();
        assert_eq!(
            first,
            Reading {
                temperature: 21.0,
                humidity: 55.0,
            }
        );

        clock.set(11);
        assert_eq!(reader.read(), first);
        assert_eq!(reader.sensor.attempts, 1);
        assert!(clock.slept.borrow().is_empty());

        clock.set(12);
        assert_eq!(reader.read().humidity, 60.0);
        assert_eq!(reader.sensor.attempts, 2);
    }

    #[test]
    fn interval_counts_from_the_last_success() {
        // Calls at t, t+1, t+3 and t+5: the second hits the cache, the
        // third is two past the first success, the fourth two past the third
        let clock = ManualClock::at(100);
        let sensor = ScriptedSensor::new([
            Ok((20.0, 40.0)),
            Ok((20.5, 41.0)),
            Ok((21.0, 42.0)),
        ]);
        let mut reader = SensorReader::new(sensor, clock.clone());

        assert_eq!(reader.read().humidity, 40.0);
        clock.set(101);
        assert_eq!(reader.read().humidity, 40.0);
        clock.set(103);
        assert_eq!(reader.read().humidity, 41.0);
        clock.set(105);
        assert_eq!(reader.read().humidity, 42.0);
        assert_eq!(reader.sensor.attempts, 3);
    }

    #[test]
    fn bootstrap_waits_out_a_full_interval() {
        let clock = ManualClock::at(1);
        let sensor = ScriptedSensor::new([Ok((21.0, 55.0))]);
        let mut reader = SensorReader::new(sensor, clock.clone());

        assert_eq!(reader.read().temperature, 21.0);
        assert_eq!(*clock.slept.borrow(), vec![MIN_READ_INTERVAL]);
        // The timestamp is the one observed on entry, before the wait
        assert_eq!(reader.last_read_time, Duration::from_secs(1));
    }

    #[test]
    fn first_failure_returns_the_fallback() {
        let clock = ManualClock::at(10);
        let sensor = ScriptedSensor::new([Err(GLITCH), Ok((19.0, 42.0))]);
        let mut reader = SensorReader::new(sensor, clock.clone());

        assert_eq!(reader.read(), FALLBACK_READING);
        assert_eq!(reader.last_reading, None);
        assert_eq!(reader.last_read_time, Duration::ZERO);

        // The failure did not advance the interval, so the next call goes
        // straight back to the hardware
        clock.set(11);
        assert_eq!(reader.read().humidity, 42.0);
        assert_eq!(reader.last_read_time, Duration::from_secs(11));
    }

    #[test]
    fn failure_returns_the_last_good_reading() {
        let clock = ManualClock::at(10);
        let sensor = ScriptedSensor::new([
            Ok((21.0, 55.0)),
            Err(GLITCH),
            Ok((22.0, 60.0)),
        ]);
        let mut reader = SensorReader::new(sensor, clock.clone());

        let good = reader.read();

        clock.set(13);
        assert_eq!(reader.read(), good);
        assert_eq!(reader.sensor.attempts, 2);
        assert_eq!(reader.last_read_time, Duration::from_secs(10));

        clock.set(14);
        assert_eq!(reader.read().humidity, 60.0);
        assert_eq!(reader.last_read_time, Duration::from_secs(14));
    }

    #[rstest]
    #[case(vec![Err(GLITCH); 4])]
    #[case(vec![Ok((20.0, 45.0)), Err(GLITCH), Err(GLITCH), Ok((21.0, 50.0))])]
    #[case(vec![Err(GLITCH), Ok((18.0, 38.0)), Err(GLITCH), Err(GLITCH)])]
    fn read_always_returns_a_reading(#[case] script: Vec<Result<(f32, f32)>>) {
        let clock = ManualClock::at(100);
        let steps = script.len();
        let mut reader = SensorReader::new(ScriptedSensor::new(script), clock.clone());

        for step in 0..steps {
            let reading = reader.read();
            assert!(reading.temperature.is_finite());
            assert!(reading.humidity.is_finite());
            clock.set(100 + 2 * (step as u64 + 1));
        }
    }

    #[test]
    fn accessors_share_the_cache() {
        let clock = ManualClock::at(10);
        let sensor = ScriptedSensor::new([Ok((21.0, 55.0))]);
        let mut reader = SensorReader::new(sensor, clock.clone());

        assert_eq!(reader.temperature(), 21.0);
        clock.set(11);
        assert_eq!(reader.humidity(), 55.0);
        assert_eq!(reader.sensor.attempts, 1);
    }
}
