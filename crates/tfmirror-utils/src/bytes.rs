use crate::error::{BytesError, BytesResult};

const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Renders a byte count with binary units, e.g. `104857600` as `100.00 MiB`.
///
/// # Example
///
/// ```
/// use tfmirror_utils::bytes::format_bytes;
///
/// assert_eq!(format_bytes(1536, 1), "1.5 KiB");
/// ```
pub fn format_bytes(bytes: u64, precision: usize) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.precision$} {}", UNITS[unit])
}

/// Parses a size such as `100MiB`, `64 KiB`, `1.5GB` or a bare byte count.
///
/// Binary suffixes (`KiB`, `MiB`, ...) use powers of 1024, decimal suffixes
/// (`KB`, `MB`, ...) powers of 1000. Suffixes are case-insensitive.
///
/// # Errors
///
/// * [`BytesError::ParseFailed`] if the number or the suffix is not recognized.
///
/// # Example
///
/// ```
/// use tfmirror_utils::bytes::parse_bytes;
///
/// assert_eq!(parse_bytes("100MiB").unwrap(), 100 * 1024 * 1024);
/// ```
pub fn parse_bytes(input: &str) -> BytesResult<u64> {
    let trimmed = input.trim();
    let fail = |reason: &str| {
        BytesError::ParseFailed {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    };

    if let Ok(v) = trimmed.parse::<u64>() {
        return Ok(v);
    }

    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| fail("missing unit suffix"))?;
    let (number, suffix) = trimmed.split_at(split);
    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| fail("invalid number"))?;
    if !number.is_finite() || number < 0.0 {
        return Err(fail("size must be a non-negative number"));
    }

    let suffix = suffix.trim().to_ascii_uppercase();
    let (prefix, base) = if let Some(p) = suffix.strip_suffix("IB") {
        (p, 1024f64)
    } else if let Some(p) = suffix.strip_suffix('B') {
        (p, 1000f64)
    } else {
        return Err(fail("invalid suffix"));
    };

    let exponent = match prefix {
        "" => 0,
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        "E" => 6,
        _ => return Err(fail("unrecognized size prefix")),
    };

    let bytes = (number * base.powi(exponent)).round();
    if bytes > u64::MAX as f64 {
        return Err(fail("size overflows u64"));
    }
    Ok(bytes as u64)
}
