//! Token lifetime strings such as `hours=1;minutes=30`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Longest lifetime a validity string may describe.
pub const MAX_VALIDITY: Duration = Duration::from_secs(100 * 365 * 86_400);

/// Invalid validity string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid token validity {input:?}: {reason}")]
pub struct ValidityParseError {
    input: String,
    reason: &'static str,
}

/// Lifetime of tokens minted for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenValidity(Duration);

impl TokenValidity {
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self(duration)
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.0
    }

    /// Whole seconds, as reported in `expires_in`.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }

    /// Lifetime as a chrono duration, saturating on overflow.
    #[must_use]
    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.0).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for TokenValidity {
    fn default() -> Self {
        Self(Duration::from_secs(600))
    }
}

impl FromStr for TokenValidity {
    type Err = ValidityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ValidityParseError {
            input: s.to_string(),
            reason,
        };

        let mut total = Duration::ZERO;
        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (unit, value) = part.split_once('=').ok_or_else(|| err("expected key=value"))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| err("value is not a number"))?;
            if !value.is_finite() || value < 0.0 {
                return Err(err("value must be a non-negative number"));
            }
            let unit_secs = match unit.trim() {
                "weeks" => 604_800.0,
                "days" => 86_400.0,
                "hours" => 3_600.0,
                "minutes" => 60.0,
                "seconds" => 1.0,
                "milliseconds" => 1e-3,
                "microseconds" => 1e-6,
                _ => return Err(err("unknown unit")),
            };
            let part = Duration::try_from_secs_f64(value * unit_secs)
                .map_err(|_| err("value out of range"))?;
            total = total
                .checked_add(part)
                .ok_or_else(|| err("value out of range"))?;
        }

        if total.is_zero() {
            return Err(err("lifetime must be positive"));
        }
        if total > MAX_VALIDITY {
            return Err(err("lifetime exceeds 100 years"));
        }
        Ok(Self(total))
    }
}

impl fmt::Display for TokenValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seconds={}", self.0.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_combined_units() {
        let v: TokenValidity = "hours=1;minutes=30".parse().unwrap();
        assert_eq!(v.as_secs(), 5400);
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_trailing_separator() {
        let v: TokenValidity = " minutes=10 ; ".parse().unwrap();
        assert_eq!(v.as_secs(), 600);
    }

    #[test]
    fn test_fractional_seconds_truncate_in_expires_in() {
        let v: TokenValidity = "seconds=1;milliseconds=999".parse().unwrap();
        assert_eq!(v.as_secs(), 1);
    }

    #[test]
    fn test_reject_invalid() {
        assert!("".parse::<TokenValidity>().is_err());
        assert!("minutes".parse::<TokenValidity>().is_err());
        assert!("fortnights=1".parse::<TokenValidity>().is_err());
        assert!("minutes=-1".parse::<TokenValidity>().is_err());
        assert!("minutes=abc".parse::<TokenValidity>().is_err());
    }

    #[test]
    fn test_reject_lifetimes_past_ceiling() {
        assert!("weeks=100000000".parse::<TokenValidity>().is_err());
        assert!("days=36501".parse::<TokenValidity>().is_err());
        assert_eq!(
            "days=36500".parse::<TokenValidity>().unwrap().duration(),
            MAX_VALIDITY
        );
    }

    #[test]
    fn test_display_round_trips() {
        let v: TokenValidity = "days=1".parse().unwrap();
        assert_eq!(v.to_string().parse::<TokenValidity>().unwrap(), v);
    }
}
