use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::helpers::{read_optional_data, write_data};

/// Euros earned per hour of teaching.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(try_from = "f64", into = "f64")]
pub struct HourlyRate(f64);

impl HourlyRate {
    pub fn new(rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate < 0.0 {
            bail!("hourly rate must be a non-negative number, got {rate}");
        }

        Ok(Self(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for HourlyRate {
    type Error = anyhow::Error;

    fn try_from(rate: f64) -> Result<Self> {
        Self::new(rate)
    }
}

impl From<HourlyRate> for f64 {
    fn from(rate: HourlyRate) -> Self {
        rate.0
    }
}

impl FromStr for HourlyRate {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        let rate = text.trim().replace(',', ".").parse::<f64>()?;

        Self::new(rate)
    }
}

impl fmt::Display for HourlyRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "€{}/h", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Preferences {
    #[serde(rename = "skiHourlyRate", default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<HourlyRate>,
}

impl Preferences {
    /// Missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match read_optional_data(path)? {
            Some(raw_data) => Ok(serde_json::from_slice(&raw_data)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_data(path, serde_json::to_string_pretty(self)?)
    }

    /// The rate used for earnings; zero while unset.
    pub fn rate_or_zero(&self) -> f64 {
        self.hourly_rate.map(HourlyRate::value).unwrap_or_default()
    }
}
