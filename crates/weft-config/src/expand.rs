//! Environment variable expansion for configuration strings.

use std::borrow::Cow;

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// `field` names the configuration key for error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env(value)
        .map(Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_unchanged() {
        assert_eq!(expand_env("ui/defs.xml", "f").unwrap(), "ui/defs.xml");
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("WEFT_EXPAND_UNSET");
        }
        let value = expand_env("${WEFT_EXPAND_UNSET:-shared}/defs.xml", "f").unwrap();
        assert_eq!(value, "shared/defs.xml");
    }

    #[test]
    fn test_set_variable_expands() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("WEFT_EXPAND_SET", "/opt/ui");
        }
        let value = expand_env("${WEFT_EXPAND_SET}/defs.xml", "f").unwrap();
        assert_eq!(value, "/opt/ui/defs.xml");
        unsafe {
            std::env::remove_var("WEFT_EXPAND_SET");
        }
    }

    #[test]
    fn test_missing_variable_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("WEFT_EXPAND_MISSING");
        }
        let err = expand_env("${WEFT_EXPAND_MISSING}", "templates.definitions[0]").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let msg = err.to_string();
        assert!(msg.contains("WEFT_EXPAND_MISSING"));
        assert!(msg.contains("templates.definitions[0]"));
    }
}
