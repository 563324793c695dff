//! Rate Limit Detection
//!
//! Recognises provider rate-limit responses and reads how long to back off.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Detect if a response indicates a rate limit error
pub fn is_rate_limit_error(status: u16, body: &str) -> bool {
    // HTTP 429 Too Many Requests
    if status == 429 {
        return true;
    }

    // Some providers return 400 or 403 with rate limit messages
    if status != 400 && status != 403 {
        return false;
    }

    let lower_body = body.to_lowercase();
    lower_body.contains("rate limit")
        || lower_body.contains("rate_limit")
        || lower_body.contains("too many requests")
        || lower_body.contains("quota exceeded")
}

/// Read the `Retry-After` header, if present and parseable
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
}

/// Parse a retry hint: whole seconds (`"30"`) or a duration string (`"1m30s"`)
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    parse_duration_string(value)
}

/// Parse a duration string like "1m30s" or "2h" into a Duration
fn parse_duration_string(s: &str) -> Option<Duration> {
    // Handle milliseconds first
    if let Some(stripped) = s.strip_suffix("ms") {
        return stripped.parse::<u64>().ok().map(Duration::from_millis);
    }

    // Compound format (e.g., "1m30s", "2h30m")
    if s.contains('h') || (s.contains('m') && s.contains('s')) {
        let mut total_secs = 0u64;
        let mut current_num = String::new();

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_num.push(c);
            } else if !current_num.is_empty() {
                // Oversized values saturate; the manager caps cooldowns anyway
                let n = current_num.parse::<u64>().unwrap_or(u64::MAX);
                let secs = match c {
                    'h' => n.saturating_mul(3600),
                    'm' => n.saturating_mul(60),
                    's' => n,
                    _ => 0,
                };
                total_secs = total_secs.saturating_add(secs);
                current_num.clear();
            }
        }

        if total_secs > 0 {
            return Some(Duration::from_secs(total_secs));
        }
    }

    // Simple cases - single unit
    if let Some(stripped) = s.strip_suffix('s') {
        return stripped
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    }
    if let Some(stripped) = s.strip_suffix('m') {
        return stripped
            .parse::<u64>()
            .ok()
            .map(|mins| Duration::from_secs(mins.saturating_mul(60)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_retry_after("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_retry_after("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_retry_after("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_parse_retry_after_rejects_bad_floats() {
        assert_eq!(parse_retry_after("-5s"), None);
        assert_eq!(parse_retry_after("-1s"), None);
        assert_eq!(parse_retry_after("1e400s"), None);
        assert_eq!(parse_retry_after("NaNs"), None);
        assert_eq!(parse_retry_after("infs"), None);
        assert_eq!(parse_retry_after("-5"), None);
    }

    #[test]
    fn test_parse_retry_after_saturates_large_values() {
        let max = Some(Duration::from_secs(u64::MAX));
        assert_eq!(parse_retry_after("9999999999999999h"), max);
        assert_eq!(parse_retry_after("999999999999999999999h"), max);
        assert_eq!(parse_retry_after("999999999999999999999m1s"), max);
        assert_eq!(parse_retry_after("999999999999999999m"), max);
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_is_rate_limit_error() {
        assert!(is_rate_limit_error(429, ""));
        assert!(is_rate_limit_error(400, "rate limit exceeded"));
        assert!(is_rate_limit_error(403, "Too Many Requests"));
        assert!(is_rate_limit_error(400, r#"{"error":"quota exceeded"}"#));
        assert!(!is_rate_limit_error(200, "success"));
        assert!(!is_rate_limit_error(500, "internal error"));
        assert!(!is_rate_limit_error(500, "rate limit backend down"));
        assert!(!is_rate_limit_error(403, "forbidden"));
    }
}
