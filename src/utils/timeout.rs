//! Timeout validation utilities for discovery runs

use std::time::Duration;

use crate::discovery::DiscoveryError;

/// Maximum polling budget for one discovery run (5 minutes)
/// Matches the worker timeout the scrapers were deployed with
pub const MAX_DISCOVERY_TIMEOUT_SECS: u64 = 300;

/// Maximum page-load timeout for a single navigation (5 minutes)
pub const MAX_PAGE_LOAD_TIMEOUT_MS: u64 = 300_000;

/// Validate the polling budget of a discovery run
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(DiscoveryError::InvalidInput)` - If zero or above MAX_DISCOVERY_TIMEOUT_SECS
pub fn validate_discovery_timeout(timeout_secs: u64) -> Result<Duration, DiscoveryError> {
    if timeout_secs == 0 {
        return Err(DiscoveryError::InvalidInput(
            "Timeout must be at least 1 second".to_string(),
        ));
    }

    if timeout_secs > MAX_DISCOVERY_TIMEOUT_SECS {
        return Err(DiscoveryError::InvalidInput(format!(
            "Timeout cannot exceed {}s ({} minutes). Received: {}s",
            MAX_DISCOVERY_TIMEOUT_SECS,
            MAX_DISCOVERY_TIMEOUT_SECS / 60,
            timeout_secs
        )));
    }

    Ok(Duration::from_secs(timeout_secs))
}

/// Validate the sleep between two network log pulls
pub fn validate_poll_interval(interval_secs: f64) -> Result<Duration, DiscoveryError> {
    if !interval_secs.is_finite() || interval_secs <= 0.0 {
        return Err(DiscoveryError::InvalidInput(format!(
            "Poll interval must be a positive number of seconds. Received: {}",
            interval_secs
        )));
    }

    Duration::try_from_secs_f64(interval_secs).map_err(|e| {
        DiscoveryError::InvalidInput(format!("Poll interval out of range: {}", e))
    })
}

/// Validate the page-load timeout used for each navigation
pub fn validate_page_load_timeout(timeout_ms: u64) -> Result<Duration, DiscoveryError> {
    if timeout_ms == 0 {
        return Err(DiscoveryError::InvalidInput(
            "Page load timeout must be at least 1ms".to_string(),
        ));
    }

    if timeout_ms > MAX_PAGE_LOAD_TIMEOUT_MS {
        return Err(DiscoveryError::InvalidInput(format!(
            "Page load timeout cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_PAGE_LOAD_TIMEOUT_MS,
            MAX_PAGE_LOAD_TIMEOUT_MS / 60_000,
            timeout_ms,
            timeout_ms as f64 / 60_000.0
        )));
    }

    Ok(Duration::from_millis(timeout_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_timeout_bounds() {
        assert!(validate_discovery_timeout(0).is_err());
        assert_eq!(validate_discovery_timeout(20).unwrap(), Duration::from_secs(20));
        assert!(validate_discovery_timeout(300).is_ok());
        assert!(validate_discovery_timeout(301).is_err());
    }

    #[test]
    fn poll_interval_rejects_non_positive_and_nan() {
        assert!(validate_poll_interval(0.0).is_err());
        assert!(validate_poll_interval(-1.0).is_err());
        assert!(validate_poll_interval(f64::NAN).is_err());
        assert!(validate_poll_interval(f64::INFINITY).is_err());
        assert_eq!(validate_poll_interval(0.25).unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn page_load_timeout_bounds() {
        assert!(matches!(
            validate_page_load_timeout(0),
            Err(DiscoveryError::InvalidInput(_))
        ));
        assert_eq!(validate_page_load_timeout(1).unwrap(), Duration::from_millis(1));
        assert!(validate_page_load_timeout(300_000).is_ok());
        let err = validate_page_load_timeout(300_001).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidInput(_)));
    }
}
