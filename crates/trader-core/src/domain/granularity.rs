//! 바 간격 (배수 + 단위).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// 간격 단위.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimespanUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimespanUnit {
    /// 프로바이더 API 경로에 쓰이는 소문자 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for TimespanUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimespanUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(ValidationError::UnknownTimespan(other.to_string())),
        }
    }
}

/// 바 간격. `multiplier`는 항상 1 이상입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Granularity {
    multiplier: u32,
    unit: TimespanUnit,
}

impl Granularity {
    pub fn new(multiplier: u32, unit: TimespanUnit) -> Result<Self> {
        if multiplier == 0 {
            return Err(ValidationError::ZeroMultiplier);
        }
        Ok(Self { multiplier, unit })
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn unit(&self) -> TimespanUnit {
        self.unit
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.multiplier, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit() {
        assert_eq!("Minute".parse::<TimespanUnit>().unwrap(), TimespanUnit::Minute);
        assert_eq!(" day ".parse::<TimespanUnit>().unwrap(), TimespanUnit::Day);
        assert!("quarter".parse::<TimespanUnit>().is_err());
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        assert_eq!(
            Granularity::new(0, TimespanUnit::Minute),
            Err(ValidationError::ZeroMultiplier)
        );
        let g = Granularity::new(5, TimespanUnit::Minute).unwrap();
        assert_eq!(g.to_string(), "5/minute");
    }
}
