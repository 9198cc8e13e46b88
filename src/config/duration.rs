//! # Duration Parsing
//!
//! Parses Kubernetes-style duration strings used in configuration.

use anyhow::Result;
use regex::Regex;
use std::time::Duration;

/// Parse Kubernetes duration string into std::time::Duration
/// Supports formats: "30s", "1m", "5m", "1h", "2h", "1d"
/// Returns Duration or error if format is invalid
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let duration_regex = Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    let interval_lower = duration_trimmed.to_lowercase();

    let captures = duration_regex
        .captures(&interval_lower)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid duration format '{}'. Expected format: <number><unit> (e.g., '30s', '5m', '1h')",
                duration_trimmed
            )
        })?;

    let number: u64 = captures
        .name("number")
        .map(|m| m.as_str())
        .unwrap_or_default()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid duration number in '{duration_trimmed}': {e}"))?;

    if number == 0 {
        return Err(anyhow::anyhow!(
            "Duration number must be greater than 0, got '{}'",
            duration_trimmed
        ));
    }

    let multiplier = match captures.name("unit").map(|m| m.as_str()) {
        Some("s") => 1,
        Some("m") => 60,
        Some("h") => 60 * 60,
        Some("d") => 24 * 60 * 60,
        other => {
            return Err(anyhow::anyhow!(
                "Unsupported duration unit {:?} in '{}'",
                other,
                duration_trimmed
            ))
        }
    };

    let seconds = number.checked_mul(multiplier).ok_or_else(|| {
        anyhow::anyhow!("Duration '{}' overflows u64 seconds", duration_trimmed)
    })?;

    Ok(Duration::from_secs(seconds))
}
