//! Validation of configured targets and check timing.

use anyhow::{Result, anyhow};
use url::Url;

/// Validate an HTTP/HTTPS endpoint target
pub fn validate_target(target: &str) -> Result<Url> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("No endpoint configured"));
    }

    let url = Url::parse(trimmed).map_err(|e| anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for HTTP endpoint: {}", other)),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("Endpoint URL has no host"));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    Ok(url)
}

/// Parse a target, discarding the reason it was rejected
pub fn parse_target(target: &str) -> Option<Url> {
    validate_target(target).ok()
}

/// Validate port is in valid range
fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }
    Ok(())
}

/// Validate check interval
pub fn validate_check_interval(interval_seconds: u64) -> Result<()> {
    const MIN_INTERVAL: u64 = 10; // 10 seconds
    const MAX_INTERVAL: u64 = 86400; // 24 hours

    if interval_seconds < MIN_INTERVAL {
        return Err(anyhow!(
            "Check interval too short: {} seconds (minimum: {})",
            interval_seconds,
            MIN_INTERVAL
        ));
    }

    if interval_seconds > MAX_INTERVAL {
        return Err(anyhow!(
            "Check interval too long: {} seconds (maximum: {})",
            interval_seconds,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

/// Validate probe timeout is reasonable
pub fn validate_timeout(timeout_seconds: u64) -> Result<()> {
    const MIN_TIMEOUT: u64 = 1;
    const MAX_TIMEOUT: u64 = 60;

    if timeout_seconds < MIN_TIMEOUT {
        return Err(anyhow!(
            "Timeout too short: {} seconds (minimum: {})",
            timeout_seconds,
            MIN_TIMEOUT
        ));
    }

    if timeout_seconds > MAX_TIMEOUT {
        return Err(anyhow!(
            "Timeout too long: {} seconds (maximum: {})",
            timeout_seconds,
            MAX_TIMEOUT
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_target() {
        // Valid
        assert!(validate_target("https://example.com").is_ok());
        assert!(validate_target("http://example.com:8080/health").is_ok());
        assert!(validate_target("  https://example.com/health  ").is_ok());
        // Private hosts are legitimate targets for a client-side monitor
        assert!(validate_target("http://localhost:3000/health").is_ok());

        // Invalid - wrong scheme
        assert!(validate_target("ftp://example.com").is_err());

        // Invalid - missing or malformed
        assert!(validate_target("").is_err());
        assert!(validate_target("   ").is_err());
        assert!(validate_target("example.com").is_err());
        assert!(validate_target("http://example.com:0").is_err());
    }

    #[test]
    fn test_empty_target_message() {
        let err = validate_target("").unwrap_err();
        assert_eq!(err.to_string(), "No endpoint configured");
    }

    #[test]
    fn test_validate_check_interval() {
        assert!(validate_check_interval(10).is_ok()); // Min
        assert!(validate_check_interval(60).is_ok()); // Normal
        assert!(validate_check_interval(86400).is_ok()); // Max

        assert!(validate_check_interval(5).is_err()); // Too short
        assert!(validate_check_interval(100000).is_err()); // Too long
    }

    #[test]
    fn test_validate_timeout() {
        assert!(validate_timeout(5).is_ok());
        assert!(validate_timeout(0).is_err());
        assert!(validate_timeout(61).is_err());
    }
}
