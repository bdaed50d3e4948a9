//! Type parsing and range validation for configuration values

use std::time::Duration;

use crate::config::errors::ConfigError;

/// Parse a boolean value from string
///
/// Supports various boolean representations:
/// - true: "true", "1", "yes", "on", "enabled" (case insensitive)
/// - false: "false", "0", "no", "off", "disabled" (case insensitive)
pub fn parse_bool(value: &str, setting_name: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(ConfigError::parse(
            setting_name,
            format!(
                "Expected boolean value, got '{}'. Valid values: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        )),
    }
}

/// Parse an integer value from string
pub fn parse_integer(value: &str, setting_name: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::parse(setting_name, format!("Expected integer, got '{}': {}", value, e)))
}

/// Parse a port number, rejecting 0
pub fn parse_port(value: &str, setting_name: &str) -> Result<u16, ConfigError> {
    let port = value.trim().parse::<u16>().map_err(|e| {
        ConfigError::parse(
            setting_name,
            format!("Expected port number (1-65535), got '{}': {}", value, e),
        )
    })?;

    if port == 0 {
        return Err(ConfigError::invalid_setting(
            setting_name,
            "Port number must be between 1 and 65535",
        ));
    }

    Ok(port)
}

/// Parse a duration value from human-readable formats
///
/// Supports formats like:
/// - "300s", "600sec", "900seconds" (seconds)
/// - "15m", "30min" (minutes)
/// - "2h", "3hr" (hours)
/// - "500ms" (milliseconds)
/// - Plain numbers default to seconds
pub fn parse_duration_human(value: &str, setting_name: &str) -> Result<Duration, ConfigError> {
    let value = value.trim().to_lowercase();

    let (number_str, unit) = match value.find(|c: char| c.is_alphabetic()) {
        Some(pos) => (value[..pos].trim(), &value[pos..]),
        None => (value.as_str(), "s"),
    };

    let number = number_str.parse::<u64>().map_err(|e| {
        ConfigError::parse(setting_name, format!("Expected number in duration '{}': {}", value, e))
    })?;

    let seconds_per_unit = match unit {
        "ms" | "millis" | "milliseconds" => return Ok(Duration::from_millis(number)),
        "s" | "sec" | "second" | "seconds" => 1,
        "m" | "min" | "minute" | "minutes" => 60,
        "h" | "hr" | "hour" | "hours" => 60 * 60,
        _ => {
            return Err(ConfigError::parse(
                setting_name,
                format!("Unknown duration unit '{}' in '{}'. Supported: ms, s, m, h", unit, value),
            ));
        }
    };

    number
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::parse(setting_name, format!("Duration '{}' is out of range", value)))
}

/// Validate a port number is within the specified range
pub fn validate_port_range(value: &str, min: u16, max: u16) -> Result<(), String> {
    let parsed = value
        .trim()
        .parse::<u16>()
        .map_err(|_| format!("Expected port number between {} and {}", min, max))?;

    if parsed < min || parsed > max {
        return Err(format!("Port {} is outside valid range {}-{}", parsed, min, max));
    }

    Ok(())
}

/// Check that `url` uses one of `allowed_schemes`
pub fn validate_url_scheme(url: &str, allowed_schemes: &[&str]) -> Result<(), String> {
    let scheme = url
        .split_once("://")
        .map(|(scheme, _)| scheme.to_lowercase())
        .ok_or_else(|| "URL is missing a scheme".to_string())?;

    if allowed_schemes.iter().any(|allowed| *allowed == scheme) {
        Ok(())
    } else {
        Err(format!(
            "URL scheme '{}' is not allowed (expected one of: {})",
            scheme,
            allowed_schemes.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        for truthy in ["true", "TRUE", "1", "yes", "On", "enabled"] {
            assert!(parse_bool(truthy, "FLAG").unwrap(), "{} should be true", truthy);
        }
        for falsy in ["false", "0", "no", "OFF", "disabled"] {
            assert!(!parse_bool(falsy, "FLAG").unwrap(), "{} should be false", falsy);
        }
    }

    #[test]
    fn test_parse_bool_invalid() {
        let err = parse_bool("maybe", "REDIS_SSL").unwrap_err();
        match err {
            ConfigError::Parse { setting_name, error } => {
                assert_eq!(setting_name, "REDIS_SSL");
                assert!(error.contains("maybe"));
            }
            other => panic!("Expected Parse error, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer(" 42 ", "N").unwrap(), 42);
        assert_eq!(parse_integer("-3", "N").unwrap(), -3);
        assert!(parse_integer("4.2", "N").is_err());
    }

    #[test]
    fn test_parse_port_rejects_zero_and_overflow() {
        assert_eq!(parse_port("6379", "REDIS_PORT").unwrap(), 6379);
        assert!(matches!(parse_port("0", "REDIS_PORT"), Err(ConfigError::InvalidSetting { .. })));
        assert!(matches!(parse_port("70000", "REDIS_PORT"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_parse_duration_human() {
        assert_eq!(parse_duration_human("30", "T").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration_human("500ms", "T").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration_human("2m", "T").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration_human("1h", "T").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration_human("5 fortnights", "T").is_err());
    }

    #[test]
    fn test_parse_duration_human_rejects_overflow() {
        let err = parse_duration_human("400000000000000000m", "REDIS_HEALTH_CHECK_INTERVAL").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(parse_duration_human("18446744073709551615h", "T").is_err());
        assert_eq!(
            parse_duration_human("18446744073709551615s", "T").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_validate_port_range() {
        assert!(validate_port_range("7000", 1, 65535).is_ok());
        assert!(validate_port_range("80", 1024, 65535).is_err());
        assert!(validate_port_range("abc", 1, 65535).is_err());
    }

    #[test]
    fn test_validate_url_scheme() {
        assert!(validate_url_scheme("postgresql://u@h/db", &["postgresql", "postgres"]).is_ok());
        assert!(validate_url_scheme("mysql://u@h/db", &["postgresql"]).is_err());
        assert!(validate_url_scheme("no-scheme", &["redis"]).is_err());
    }
}
