//! Masking helpers used by every builder's debug output and log lines

use serde::Serializer;
use serde_json::Value;

/// Mask a secret for display: keeps at most the first 3 characters of values
/// long enough that doing so reveals little, and always reports the length
pub fn mask_secret(value: &str) -> String {
    let len = value.chars().count();
    if len == 0 {
        return "<empty>".to_string();
    }
    if len < 12 {
        return format!("***(len={})", len);
    }
    let prefix: String = value.chars().take(3).collect();
    format!("{}***(len={})", prefix, len)
}

/// Replace the password component of a URL with `***`
///
/// URLs that do not parse, or whose password cannot be replaced in place,
/// are returned with everything between `://` and the last `@` masked, so
/// credentials never leak through malformed input.
pub fn mask_url_credentials(raw: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(raw) {
        if parsed.password().is_none() {
            return parsed.to_string();
        }
        if parsed.set_password(Some("***")).is_ok() {
            return parsed.to_string();
        }
    }

    match (raw.find("://"), raw.rfind('@')) {
        (Some(start), Some(at)) if at > start + 3 => {
            format!("{}***{}", &raw[..start + 3], &raw[at..])
        }
        _ => raw.to_string(),
    }
}

/// `serialize_with` helper writing [`mask_secret`] instead of the value
pub fn serialize_masked<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&mask_secret(value))
}

/// Like [`serialize_masked`] for optional secrets; `None` stays `null`
pub fn serialize_masked_option<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.serialize_str(&mask_secret(value)),
        None => serializer.serialize_none(),
    }
}

/// `serialize_with` helper writing [`mask_url_credentials`] instead of the URL
pub fn serialize_masked_url<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&mask_url_credentials(value))
}

/// Emit a one-line summary of a component's debug info at info level
pub fn log_config_summary(component: &str, info: &Value) {
    tracing::info!(component, "configuration summary: {}", info);
}
