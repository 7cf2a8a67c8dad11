//! Public link codes and their allowed lifetimes.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use canopy_core::error::AppError;

/// How long a public link stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkDuration {
    /// One hour.
    #[serde(rename = "1h")]
    OneHour,
    /// One day.
    #[serde(rename = "1d")]
    OneDay,
    /// Seven days.
    #[serde(rename = "7d")]
    SevenDays,
}

impl LinkDuration {
    /// The lifetime as a duration.
    pub fn as_duration(&self) -> chrono::Duration {
        match self {
            Self::OneHour => chrono::Duration::hours(1),
            Self::OneDay => chrono::Duration::days(1),
            Self::SevenDays => chrono::Duration::days(7),
        }
    }

    /// Short label used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::OneDay => "1d",
            Self::SevenDays => "7d",
        }
    }
}

impl fmt::Display for LinkDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkDuration {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Self::OneHour),
            "1d" => Ok(Self::OneDay),
            "7d" => Ok(Self::SevenDays),
            _ => Err(AppError::invalid_argument(format!(
                "Invalid link duration: '{s}'. Expected one of: 1h, 1d, 7d"
            ))),
        }
    }
}

/// Generates random alphanumeric share codes.
#[derive(Debug, Clone)]
pub struct ShareCodeGenerator {
    length: usize,
}

impl ShareCodeGenerator {
    /// Creates a generator producing codes of `length` characters.
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    /// Generates a fresh code.
    pub fn generate(&self) -> String {
        rand::rng()
            .sample_iter(Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_alphanumeric_of_configured_length() {
        let generator = ShareCodeGenerator::new(12);
        let code = generator.generate();
        assert_eq!(code.len(), 12);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(code, generator.generate());
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!("7d".parse::<LinkDuration>().unwrap(), LinkDuration::SevenDays);
        assert_eq!(LinkDuration::OneHour.as_duration(), chrono::Duration::hours(1));
        assert!("2w".parse::<LinkDuration>().is_err());
    }
}
