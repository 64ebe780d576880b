//! Duration parsing and formatting for stage timeouts

use serde::Serializer;
use std::time::Duration;

/// Parse duration string (e.g., "10s", "5m", "1h", "100ms")
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let (num_str, unit) = s
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| s.split_at(i))
        .unwrap_or((s, "s"));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", num_str))?;

    let multiplier = match unit.to_lowercase().as_str() {
        "ms" => 1,
        "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        _ => return Err(format!("unknown duration unit: {}", unit)),
    };

    let millis = num
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration too large: {}", s))?;
    Ok(Duration::from_millis(millis))
}

/// Parse a stage timeout. `none`, `off` and `0` disable the limit.
pub fn parse_timeout(s: &str) -> std::result::Result<Option<Duration>, String> {
    match s.trim().to_lowercase().as_str() {
        "none" | "off" => Ok(None),
        _ => parse_duration(s).map(|d| (!d.is_zero()).then_some(d)),
    }
}

/// Format duration using the largest unit that divides it evenly
pub fn format_duration(duration: &Duration) -> String {
    let millis = duration.as_millis() as u64;

    if millis == 0 {
        return "0s".to_string();
    }

    if millis.is_multiple_of(60 * 60 * 1000) {
        format!("{}h", millis / (60 * 60 * 1000))
    } else if millis.is_multiple_of(60 * 1000) {
        format!("{}m", millis / (60 * 1000))
    } else if millis.is_multiple_of(1000) {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

pub(crate) fn serialize_timeout<S>(
    timeout: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match timeout {
        Some(d) => serializer.serialize_str(&format_duration(d)),
        None => serializer.serialize_str("none"),
    }
}
