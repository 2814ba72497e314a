//! Fan curves and the hysteresis-aware speed lookup

use crate::errors::{DaemonError, Result};
use std::collections::BTreeMap;

/// Lowest temperature a sensor or a curve threshold may report
pub const MIN_TEMPERATURE: i32 = 0;
/// Highest temperature a sensor or a curve threshold may report
pub const MAX_TEMPERATURE: i32 = 120;
/// Speed used above the highest configured threshold
pub const FULL_SPEED: u8 = 100;

/// Ordered temperature threshold (°C) to fan speed (%) mapping.
///
/// The speed of a threshold applies to every temperature strictly below it,
/// so walking the map in ascending order finds the first threshold the
/// current temperature has not reached yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanCurve {
    points: BTreeMap<i32, u8>,
}

impl FanCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, temp: i32, duty: u8) {
        self.points.insert(temp, duty);
    }

    /// Iterate `(threshold, speed)` pairs in ascending threshold order
    pub fn points(&self) -> impl Iterator<Item = (i32, u8)> + '_ {
        self.points.iter().map(|(t, d)| (*t, *d))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Speed of the first threshold `t` with `temperature < t - hysteresis`,
    /// or full speed when the temperature is above every threshold.
    pub fn lookup(&self, temperature: i32, hysteresis: i32) -> u8 {
        self.points
            .iter()
            .find(|(threshold, _)| temperature < **threshold - hysteresis)
            .map(|(_, duty)| *duty)
            .unwrap_or(FULL_SPEED)
    }

    /// Target speed for `temperature` given the speed currently applied.
    ///
    /// Hysteresis is only applied when the plain lookup would lower the fan
    /// speed; rising speeds are applied immediately.
    pub fn optimal_speed(&self, temperature: i32, current: Option<u8>, hysteresis: i32) -> u8 {
        let candidate = self.lookup(temperature, 0);
        match current {
            Some(current) if candidate < current => self.lookup(temperature, hysteresis),
            _ => candidate,
        }
    }

    /// Check thresholds are in the sensor range and speeds never decrease
    pub fn validate(&self) -> Result<()> {
        let mut previous: Option<u8> = None;
        for (threshold, speed) in self.points() {
            if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&threshold) {
                return Err(DaemonError::InvalidThreshold { value: threshold });
            }
            if speed > FULL_SPEED {
                return Err(DaemonError::InvalidFanSpeed {
                    threshold,
                    speed: i64::from(speed),
                });
            }
            if let Some(previous) = previous {
                if speed < previous {
                    return Err(DaemonError::DecreasingCurve {
                        threshold,
                        previous,
                        speed,
                    });
                }
            }
            previous = Some(speed);
        }
        Ok(())
    }
}

impl FromIterator<(i32, u8)> for FanCurve {
    fn from_iter<I: IntoIterator<Item = (i32, u8)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
