//! Simulation clock and day/night cycle.

use crate::config::ClockConfig;
use serde::{Deserialize, Serialize};

/// Tracks total simulated time, the day counter and the phase within a day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Total simulated seconds
    pub time: f64,
    /// Seconds into the current day, in [0, day_length)
    pub day_time: f32,
    /// Completed days
    pub day_number: u32,
    pub day_length: f32,
    night_start_hour: f32,
    night_end_hour: f32,
    night_light: f32,
    twilight_hours: f32,
    twilight_gain: f32,
}

impl SimClock {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            time: 0.0,
            day_time: config.start_hour / 24.0 * config.day_length,
            day_number: 0,
            day_length: config.day_length,
            night_start_hour: config.night_start_hour,
            night_end_hour: config.night_end_hour,
            night_light: config.night_light,
            twilight_hours: config.twilight_hours,
            twilight_gain: config.twilight_gain,
        }
    }

    /// Advance the clock. Returns true if a new day started.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.time += dt as f64;
        self.day_time += dt;
        let mut rolled = false;
        while self.day_time >= self.day_length {
            self.day_time -= self.day_length;
            self.day_number += 1;
            rolled = true;
        }
        rolled
    }

    /// Current hour in [0, 24)
    #[inline]
    pub fn hour(&self) -> f32 {
        self.day_time / self.day_length * 24.0
    }

    /// Position in the day, 0.0 to 1.0 (0.5 is noon)
    #[inline]
    pub fn time_of_day(&self) -> f32 {
        (self.day_time / self.day_length).rem_euclid(1.0)
    }

    #[inline]
    pub fn is_night(&self) -> bool {
        let hour = self.hour();
        hour < self.night_end_hour || hour >= self.night_start_hour
    }

    /// Ambient light in [night_light, 1.0]. Dawn ramps up from
    /// `night_light` by `twilight_gain` and full daylight follows; dusk ramps
    /// down from 1.0 by the same gain before dropping to `night_light`.
    pub fn light_intensity(&self) -> f32 {
        let hour = self.hour();
        let dawn_end = self.night_end_hour + self.twilight_hours;
        let dusk_end = self.night_start_hour + self.twilight_hours;

        if (self.night_end_hour..dawn_end).contains(&hour) {
            self.night_light
                + self.twilight_gain * (hour - self.night_end_hour) / self.twilight_hours
        } else if (dawn_end..self.night_start_hour).contains(&hour) {
            1.0
        } else if (self.night_start_hour..dusk_end).contains(&hour) {
            1.0 - self.twilight_gain * (hour - self.night_start_hour) / self.twilight_hours
        } else {
            self.night_light
        }
    }

    /// Jump to a given hour of the current day
    pub fn set_hour(&mut self, hour: f32) {
        self.day_time = hour.rem_euclid(24.0) / 24.0 * self.day_length;
    }
}
