//! Minimal EventBridge-style `rate(...)` expression parser.
//!
//! Supports `rate(N seconds|minutes|hours)` (singular or plural,
//! case-insensitive), e.g. `rate(5 minutes)`, `rate(1 hour)`.

use mimiq_core::{MimiqError, Result};

/// Parse a rate expression into interval seconds.
pub fn parse_rate_expression(expr: &str) -> Result<u64> {
    let invalid = || {
        MimiqError::InvalidArgument(format!(
            "invalid rate expression '{expr}' (expected rate(N seconds|minutes|hours))"
        ))
    };

    let lower = expr.trim().to_ascii_lowercase();
    let inner = lower
        .strip_prefix("rate(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(invalid)?;

    let parts: Vec<&str> = inner.split_whitespace().collect();
    let [value, unit] = parts.as_slice() else {
        return Err(invalid());
    };
    let n: u64 = value.parse().map_err(|_| invalid())?;
    if n == 0 {
        return Err(invalid());
    }
    match *unit {
        "second" | "seconds" => Ok(n),
        "minute" | "minutes" => Ok(n * 60),
        "hour" | "hours" => Ok(n * 3600),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes() {
        assert_eq!(parse_rate_expression("rate(5 minutes)").unwrap(), 300);
        assert_eq!(parse_rate_expression("rate(1 minute)").unwrap(), 60);
    }

    #[test]
    fn test_seconds_and_hours() {
        assert_eq!(parse_rate_expression("rate(30 seconds)").unwrap(), 30);
        assert_eq!(parse_rate_expression("rate(2 hours)").unwrap(), 7200);
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(parse_rate_expression("  RATE( 10  Minutes )  ").unwrap(), 600);
    }

    #[test]
    fn test_invalid_expressions() {
        for bad in [
            "every 5 minutes",
            "rate(0 minutes)",
            "rate(5 fortnights)",
            "rate(5)",
            "rate(five minutes)",
            "",
        ] {
            assert!(parse_rate_expression(bad).is_err(), "accepted: {bad}");
        }
    }
}
