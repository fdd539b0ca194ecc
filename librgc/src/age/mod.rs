//! Minimum-age duration parsing.
//!
//! Sweep ages are written as a positive integer with an optional unit
//! suffix: `s`, `m`, `h`, `d`, or `w`. A bare integer is seconds.

use crate::error::{Result, RgcError};
use chrono::Duration;


/// Parses an age specification like `"1d"` or `"30"` into a duration.
///
/// # Examples
///
/// ```
/// use librgc::age::parse_age;
///
/// assert_eq!(parse_age("6m").unwrap().num_seconds(), 360);
/// assert_eq!(parse_age("30").unwrap().num_seconds(), 30);
/// ```
pub fn parse_age(spec: &str) -> Result<Duration> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(RgcError::config("Age specification cannot be empty", None));
    }

    let (digits, multiplier) = match spec.chars().last() {
        Some('s') => (&spec[..spec.len() - 1], 1),
        Some('m') => (&spec[..spec.len() - 1], 60),
        Some('h') => (&spec[..spec.len() - 1], 3600),
        Some('d') => (&spec[..spec.len() - 1], 86400),
        Some('w') => (&spec[..spec.len() - 1], 604800),
        Some(c) if c.is_ascii_digit() => (spec, 1),
        _ => {
            return Err(RgcError::config(
                format!("Invalid age specification: '{}'", spec),
                None,
            ));
        }
    };

    // Digits only: a sign would otherwise survive into parse() and turn
    // the sweep age negative.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RgcError::config(
            format!("Invalid age specification: '{}'", spec),
            None,
        ));
    }

    let value: i64 = digits.parse().map_err(|_| {
        RgcError::config(format!("Invalid age specification: '{}'", spec), None)
    })?;

    value
        .checked_mul(multiplier)
        .and_then(Duration::try_seconds)
        .ok_or_else(|| RgcError::config(format!("Age specification out of range: '{}'", spec), None))
}
