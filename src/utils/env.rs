//! Environment lookups for the `LOVELINK_` namespace.

use std::str::FromStr;

const PREFIX: &str = "LOVELINK_";

/// Read `LOVELINK_{key}`, or `{key}` when the prefixed variable is unset.
///
/// ```rust
/// use lovelink::utils::get_env_with_prefix;
///
/// // LOVELINK_LOG_LEVEL, then LOG_LEVEL
/// let level = get_env_with_prefix("LOG_LEVEL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("{PREFIX}{key}"))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Read and parse a setting, ignoring values that do not parse.
///
/// Surrounding whitespace is trimmed first. An unparseable value is logged
/// and treated as unset so the caller keeps its default.
pub fn parse_env_with_prefix<T: FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(
                target: "lovelink::config",
                key = %key,
                value = %raw,
                "Ignoring unparseable environment setting"
            );
            None
        }
    }
}
