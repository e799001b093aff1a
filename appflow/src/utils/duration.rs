//! Parsing of interval strings such as `10s`, `1m30s` or `500ms`.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while parsing a duration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DurationError {
    /// The input was empty.
    #[error("empty duration string")]
    Empty,

    /// A number was not followed by a unit.
    #[error("missing unit in duration '{0}'")]
    MissingUnit(String),

    /// The unit is not recognised.
    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit {
        /// The offending unit.
        unit: String,
        /// The full input.
        input: String,
    },

    /// The numeric part could not be parsed.
    #[error("invalid number in duration '{0}'")]
    InvalidNumber(String),

    /// The value does not fit in a [`Duration`].
    #[error("duration '{0}' is out of range")]
    Overflow(String),
}

/// Parses a duration made of `<number><unit>` segments.
///
/// Units: `ns`, `us`, `ms`, `s`, `m`, `h`. Numbers may be fractional.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| DurationError::MissingUnit(text.to_string()))?;
        if number_len == 0 {
            return Err(DurationError::InvalidNumber(text.to_string()));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| DurationError::InvalidNumber(text.to_string()))?;
        if !value.is_finite() {
            return Err(DurationError::Overflow(text.to_string()));
        }
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let seconds_per_unit = match unit.to_ascii_lowercase().as_str() {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => {
                return Err(DurationError::UnknownUnit {
                    unit: unit.to_string(),
                    input: text.to_string(),
                })
            }
        };
        let segment = Duration::try_from_secs_f64(value * seconds_per_unit)
            .map_err(|_| DurationError::Overflow(text.to_string()))?;
        total = total
            .checked_add(segment)
            .ok_or_else(|| DurationError::Overflow(text.to_string()))?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_compound_and_case() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5S").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert!(matches!(parse_duration("10"), Err(DurationError::MissingUnit(_))));
        assert!(matches!(parse_duration("10d"), Err(DurationError::UnknownUnit { .. })));
        assert!(matches!(parse_duration("s"), Err(DurationError::InvalidNumber(_))));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(
            parse_duration("99999999999999999999h"),
            Err(DurationError::Overflow(_))
        ));
        assert!(matches!(
            parse_duration(&format!("{}s", "9".repeat(400))),
            Err(DurationError::Overflow(_))
        ));
        assert!(matches!(
            parse_duration("18446744073709551615s1s"),
            Err(DurationError::Overflow(_))
        ));
    }
}
