use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateParseError {
    #[error("rate '{0}' must look like '<count>/<period>'")]
    Format(String),
    #[error("rate '{0}' has an invalid request count")]
    Count(String),
    #[error("rate '{0}' has an unknown period; use second, minute, hour or day")]
    Period(String),
}

/// Maximum number of requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub num_requests: u64,
    pub window: Duration,
}

impl Rate {
    pub const fn new(num_requests: u64, window: Duration) -> Self {
        Self {
            num_requests,
            window,
        }
    }

    pub const fn per_hour(num_requests: u64) -> Self {
        Self::new(num_requests, Duration::from_secs(3600))
    }
}

impl FromStr for Rate {
    type Err = RateParseError;

    /// Parses `"200/hour"`; only the first letter of the period counts, so
    /// `"10/m"`, `"10/min"` and `"10/minute"` are equivalent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, period) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| RateParseError::Format(s.to_string()))?;

        let num_requests: u64 = count
            .trim()
            .parse()
            .map_err(|_| RateParseError::Count(s.to_string()))?;

        let secs = match period.trim().chars().next() {
            Some('s') => 1,
            Some('m') => 60,
            Some('h') => 3600,
            Some('d') => 86_400,
            _ => return Err(RateParseError::Period(s.to_string())),
        };

        Ok(Rate::new(num_requests, Duration::from_secs(secs)))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.num_requests, self.window.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hourly_rate() {
        assert_eq!("200/hour".parse::<Rate>().unwrap(), Rate::per_hour(200));
    }

    #[test]
    fn period_prefix_is_enough() {
        let rate: Rate = "10/m".parse().unwrap();
        assert_eq!(rate.window, Duration::from_secs(60));
        let rate: Rate = " 5 / day ".parse().unwrap();
        assert_eq!(rate, Rate::new(5, Duration::from_secs(86_400)));
    }

    #[test]
    fn rejects_malformed_rates() {
        assert!(matches!(
            "200".parse::<Rate>(),
            Err(RateParseError::Format(_))
        ));
        assert!(matches!(
            "many/hour".parse::<Rate>(),
            Err(RateParseError::Count(_))
        ));
        assert!(matches!(
            "10/week".parse::<Rate>(),
            Err(RateParseError::Period(_))
        ));
    }
}
