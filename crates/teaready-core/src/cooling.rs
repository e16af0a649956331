//! How long a freshly steeped cup should rest before it is drinkable.
//!
//! Linear model: every degree of brewing temperature above 80 °C adds
//! `minutes_per_degree` of cooling, minus the time already spent steeping,
//! plus a margin for the drinker's readiness preference.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Brewing temperature at which no cooling is needed.
pub const BASELINE_CELSIUS: i64 = 80;

pub const DEFAULT_MINUTES_PER_DEGREE: f64 = 2.5;

/// Delays at or below this many seconds count as "already ready".
pub const DEFAULT_THRESHOLD_SECS: i64 = 30;

/// How cool the drinker wants the cup before being told it is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Readiness {
    #[default]
    Hot = 1,
    Warm = 2,
    Mild = 3,
    Cool = 4,
}

impl Readiness {
    /// Extra wait on top of the temperature model.
    pub fn margin_secs(self) -> i64 {
        match self {
            Readiness::Hot => 0,
            Readiness::Warm => 6 * 60,
            Readiness::Mild => 14 * 60,
            Readiness::Cool => 24 * 60,
        }
    }
}

impl TryFrom<u8> for Readiness {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Readiness::Hot),
            2 => Ok(Readiness::Warm),
            3 => Ok(Readiness::Mild),
            4 => Ok(Readiness::Cool),
            other => Err(format!("readiness must be 1-4, got {other}")),
        }
    }
}

impl From<Readiness> for u8 {
    fn from(r: Readiness) -> Self {
        r as u8
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Readiness::Hot => "hot",
            Readiness::Warm => "warm",
            Readiness::Mild => "mild",
            Readiness::Cool => "cool",
        };
        f.write_str(s)
    }
}

/// Seconds to wait after steeping. May be negative.
pub fn cooling_delay(
    temperature_celsius: u8,
    prior_duration_secs: u16,
    readiness: Readiness,
    minutes_per_degree: f64,
) -> i64 {
    let degrees = (i64::from(temperature_celsius) - BASELINE_CELSIUS) as f64;
    // Truncates toward zero.
    let temperature_secs = (degrees * minutes_per_degree * 60.0) as i64;
    -i64::from(prior_duration_secs) + temperature_secs + readiness.margin_secs()
}

/// Tunable parameters of the cooling model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoolingModel {
    pub minutes_per_degree: f64,
    pub threshold_secs: i64,
}

impl Default for CoolingModel {
    fn default() -> Self {
        Self {
            minutes_per_degree: DEFAULT_MINUTES_PER_DEGREE,
            threshold_secs: DEFAULT_THRESHOLD_SECS,
        }
    }
}

impl CoolingModel {
    pub fn delay(
        &self,
        temperature_celsius: u8,
        prior_duration_secs: u16,
        readiness: Readiness,
    ) -> i64 {
        cooling_delay(
            temperature_celsius,
            prior_duration_secs,
            readiness,
            self.minutes_per_degree,
        )
    }

    /// Whether a delay is long enough to warrant a separate cooling phase.
    pub fn needs_cooling(&self, delay_secs: i64) -> bool {
        delay_secs > self.threshold_secs
    }
}
