use std::time::Duration;

use crate::error::{DurationError, DurationResult};

/// Parses a compact duration such as `30s`, `10m`, `1h30m` or `250ms`.
///
/// Components are summed, so `1m30s` is ninety seconds. A bare number is
/// read as seconds.
///
/// # Errors
///
/// * [`DurationError::ParseFailed`] on an empty string, an unknown unit or overflow.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tfmirror_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
/// ```
pub fn parse_duration(input: &str) -> DurationResult<Duration> {
    let fail = || {
        DurationError::ParseFailed {
            input: input.to_string(),
        }
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(fail());
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total_ms: u64 = 0;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(fail)?;
        if digits == 0 {
            return Err(fail());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| fail())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let multiplier: u64 = match &rest[..unit_len] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            _ => return Err(fail()),
        };
        rest = &rest[unit_len..];

        total_ms = value
            .checked_mul(multiplier)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(fail)?;
    }

    Ok(Duration::from_millis(total_ms))
}
