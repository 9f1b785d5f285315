use chrono::{Datelike, NaiveDate};
use std::{error::Error, fmt};

/// Date used when a model config does not name one.
pub const DEFAULT_DATE: &str = "2020-01-01";

/// Configuration for building a sampled magnetic model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    /// Grid spacing in degrees; must be finite and positive.
    pub resolution: f64,
    /// Evaluation date as "YYYY-MM-DD"; defaults to [`DEFAULT_DATE`].
    pub date: Option<String>,
    /// Alternate model name. Only the default model is supported; setting
    /// this is a configuration error.
    pub model: Option<String>,
    /// Alternate model version. Same restriction as `model`.
    pub version: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            resolution: 1.0,
            date: None,
            model: None,
            version: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_some() || self.version.is_some() {
            return Err(ConfigError::UnsupportedModel {
                model: self.model.clone(),
                version: self.version.clone(),
            });
        }
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(ConfigError::NonPositiveResolution(self.resolution));
        }
        Ok(())
    }

    pub fn decimal_year(&self) -> Result<f64, ConfigError> {
        to_decimal_year(self.date.as_deref().unwrap_or(DEFAULT_DATE))
    }
}

/// Convert a calendar date to a fractional year:
/// `year + (day_of_year - 1) / days_in_year`, 366 days in leap years.
pub fn to_decimal_year(date: &str) -> Result<f64, ConfigError> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
        ConfigError::InvalidDate {
            date: date.to_string(),
            reason: e.to_string(),
        }
    })?;
    let days_in_year = if parsed.leap_year() { 366.0 } else { 365.0 };
    Ok(f64::from(parsed.year()) + (f64::from(parsed.ordinal()) - 1.0) / days_in_year)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NonPositiveResolution(f64),
    UnsupportedModel {
        model: Option<String>,
        version: Option<String>,
    },
    InvalidDate {
        date: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositiveResolution(r) => {
                write!(f, "sample resolution must be positive, got {r}")
            }
            ConfigError::UnsupportedModel { model, version } => write!(
                f,
                "no support for alternate model/version (model: {model:?}, version: {version:?})"
            ),
            ConfigError::InvalidDate { date, reason } => {
                write!(f, "invalid date {date:?}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}
