//! Duration-string parsing (`"1 day"`, `"2h 30m"` → milliseconds).

use crate::error::{BaseError, Result};

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_DAY: f64 = 86_400_000.0;
const MS_PER_WEEK: f64 = 604_800_000.0;
// Calendar-free approximations: 30-day months, 365-day years.
const MS_PER_MONTH: f64 = 2_592_000_000.0;
const MS_PER_YEAR: f64 = 31_536_000_000.0;

/// Unit tokens ordered longest-first within each family so greedy
/// matching prefers `"days"` over `"day"` over `"d"`. All entries
/// match case-insensitively except the single letters `m`/`M`,
/// which disambiguate minutes from months by case.
const UNITS: &[(&str, f64)] = &[
    ("seconds", MS_PER_SECOND),
    ("second", MS_PER_SECOND),
    ("secs", MS_PER_SECOND),
    ("sec", MS_PER_SECOND),
    ("s", MS_PER_SECOND),
    ("minutes", MS_PER_MINUTE),
    ("minute", MS_PER_MINUTE),
    ("mins", MS_PER_MINUTE),
    ("min", MS_PER_MINUTE),
    ("months", MS_PER_MONTH),
    ("month", MS_PER_MONTH),
    ("hours", MS_PER_HOUR),
    ("hour", MS_PER_HOUR),
    ("h", MS_PER_HOUR),
    ("days", MS_PER_DAY),
    ("day", MS_PER_DAY),
    ("d", MS_PER_DAY),
    ("weeks", MS_PER_WEEK),
    ("week", MS_PER_WEEK),
    ("w", MS_PER_WEEK),
    ("years", MS_PER_YEAR),
    ("year", MS_PER_YEAR),
    ("y", MS_PER_YEAR),
];

/// Parse a duration string as a sum of `(number, unit)` segments,
/// returning total milliseconds. Errors on empty input, unknown
/// units, or trailing garbage.
pub fn parse_duration(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(BaseError::Eval("Invalid duration: empty string".to_string()));
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let len = chars.len();
    let mut i = 0;
    let mut total_ms = 0.0_f64;
    let mut segments = 0;

    while i < len {
        // Skip whitespace between segments
        while i < len && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= len {
            break;
        }

        // Number: optional -, digits, optional decimal point
        let num_start = i;
        if chars[i] == '-' {
            i += 1;
        }
        let digits_start = i;
        while i < len && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i < len && chars[i] == '.' {
            i += 1;
            while i < len && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i == digits_start {
            return Err(BaseError::Eval(format!(
                "Invalid duration \"{}\": expected a number at position {}",
                trimmed, num_start
            )));
        }
        let number: f64 = chars[num_start..i]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| {
                BaseError::Eval(format!("Invalid duration \"{}\": bad number", trimmed))
            })?;

        // Optional whitespace between number and unit
        while i < len && chars[i].is_whitespace() {
            i += 1;
        }

        // Unit: greedy, longest token first
        let rest: String = chars[i..].iter().collect();
        let Some((token_len, ms_per_unit)) = match_unit(&rest) else {
            return Err(BaseError::Eval(format!(
                "Invalid duration \"{}\": unknown unit at position {}",
                trimmed, i
            )));
        };
        i += token_len;

        // The unit must end the segment: the next char is whitespace,
        // a digit/minus starting the next segment, or end of input.
        if i < len && !chars[i].is_whitespace() && !chars[i].is_ascii_digit() && chars[i] != '-'
        {
            return Err(BaseError::Eval(format!(
                "Invalid duration \"{}\": unexpected character at position {}",
                trimmed, i
            )));
        }

        total_ms += number * ms_per_unit;
        segments += 1;
    }

    if segments == 0 {
        return Err(BaseError::Eval(format!(
            "Invalid duration \"{}\": no segments",
            trimmed
        )));
    }

    Ok(total_ms.round() as i64)
}

/// Best-effort form: None on any failure. Used only by date±string
/// arithmetic, where a non-duration string falls through to regular
/// `+`/`-` handling.
pub fn parse_duration_opt(input: &str) -> Option<i64> {
    parse_duration(input).ok()
}

/// Match a unit token at the start of `rest`, returning its char
/// length and ms multiplier. Single-letter `m` is minutes, `M` is
/// months; everything else matches case-insensitively.
fn match_unit(rest: &str) -> Option<(usize, f64)> {
    if rest.starts_with('M')
        && !rest[1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
    {
        return Some((1, MS_PER_MONTH));
    }
    if rest.starts_with('m')
        && !rest[1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
    {
        return Some((1, MS_PER_MINUTE));
    }

    let lower = rest.to_lowercase();
    for (token, ms) in UNITS {
        if token.len() > 1 && lower.starts_with(token) {
            return Some((token.len(), *ms));
        }
    }
    // Remaining single-letter units (s, h, d, w, y), case-insensitive.
    for (token, ms) in UNITS {
        if token.len() == 1 && *token != "m" && lower.starts_with(token) {
            return Some((1, *ms));
        }
    }
    None
}

/// Compact human rendering of a millisecond total, used when a
/// Duration value reaches string output. `90061000` → `"1d 1h 1m 1s"`.
pub fn format_duration(ms: i64) -> String {
    if ms == 0 {
        return "0s".to_string();
    }
    let negative = ms < 0;
    let mut rest = ms.unsigned_abs();

    let mut parts = Vec::new();
    for (label, unit_ms) in [
        ("w", 604_800_000_u64),
        ("d", 86_400_000),
        ("h", 3_600_000),
        ("m", 60_000),
        ("s", 1_000),
        ("ms", 1),
    ] {
        let count = rest / unit_ms;
        if count > 0 {
            parts.push(format!("{}{}", count, label));
            rest %= unit_ms;
        }
    }

    let body = parts.join(" ");
    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_duration("1s").unwrap(), 1_000);
        assert_eq!(parse_duration("1 day").unwrap(), 86_400_000);
        assert_eq!(parse_duration("2 weeks").unwrap(), 1_209_600_000);
        assert_eq!(parse_duration("1y").unwrap(), 31_536_000_000);
    }

    #[test]
    fn test_parse_minute_vs_month() {
        assert_eq!(parse_duration("1m").unwrap(), 60_000);
        assert_eq!(parse_duration("1M").unwrap(), 2_592_000_000);
        // Multi-letter forms are case-insensitive
        assert_eq!(parse_duration("1 MONTH").unwrap(), 2_592_000_000);
        assert_eq!(parse_duration("1 Min").unwrap(), 60_000);
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_duration("2h 30m").unwrap(), 9_000_000);
        assert_eq!(parse_duration("1d2h").unwrap(), 93_600_000);
        assert_eq!(parse_duration(" 1 week 2 days ").unwrap(), 777_600_000);
    }

    #[test]
    fn test_parse_fractional_and_negative() {
        assert_eq!(parse_duration("1.5h").unwrap(), 5_400_000);
        assert_eq!(parse_duration("-1 day").unwrap(), -86_400_000);
        assert_eq!(parse_duration("1h -30m").unwrap(), 1_800_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("   ").is_err());
        assert!(parse_duration("1 fortnight").is_err());
        assert!(parse_duration("1day2").is_err());
        assert!(parse_duration("day").is_err());
        assert!(parse_duration("1dx").is_err());
    }

    #[test]
    fn test_parse_opt_swallows_errors() {
        assert_eq!(parse_duration_opt("1 week"), Some(604_800_000));
        assert_eq!(parse_duration_opt("next tuesday"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(90_061_000), "1d 1h 1m 1s");
        assert_eq!(format_duration(-60_000), "-1m");
        assert_eq!(format_duration(1_500), "1s 500ms");
    }
}
