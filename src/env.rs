//! Environment variable names used by this crate for convenient
//! configuration of the layout from services.
//!
//! These are purely helpers; [`LayoutConfig`] itself never reads the
//! environment.

use crate::config::LayoutConfig;
use crate::error::ConfigError;

/// Output charset, e.g. `UTF-8`.
pub const LOG_LAYOUT_CHARSET_ENV: &str = "LOG_LAYOUT_CHARSET";

/// Separator after each JSON line, quoted as in host configuration files.
pub const LOG_LAYOUT_LINE_SEPARATOR_ENV: &str = "LOG_LAYOUT_LINE_SEPARATOR";

/// Separator between lines of a flattened exception chain.
pub const LOG_LAYOUT_STACK_TRACE_SEPARATOR_ENV: &str = "LOG_LAYOUT_STACK_TRACE_SEPARATOR";

/// Name of a registered builder configurer, e.g. `pretty`.
pub const LOG_LAYOUT_BUILDER_CONFIGURER_ENV: &str = "LOG_LAYOUT_BUILDER_CONFIGURER";

pub const LOG_LAYOUT_FIELD_SEQUENCE_NUMBER_ENV: &str = "LOG_LAYOUT_FIELD_SEQUENCE_NUMBER";
pub const LOG_LAYOUT_FIELD_TIMESTAMP_ENV: &str = "LOG_LAYOUT_FIELD_TIMESTAMP";
pub const LOG_LAYOUT_FIELD_THREAD_ENV: &str = "LOG_LAYOUT_FIELD_THREAD";
pub const LOG_LAYOUT_FIELD_LEVEL_ENV: &str = "LOG_LAYOUT_FIELD_LEVEL";
pub const LOG_LAYOUT_FIELD_LOGGER_ENV: &str = "LOG_LAYOUT_FIELD_LOGGER";
pub const LOG_LAYOUT_FIELD_MESSAGE_ENV: &str = "LOG_LAYOUT_FIELD_MESSAGE";
pub const LOG_LAYOUT_FIELD_ERROR_ENV: &str = "LOG_LAYOUT_FIELD_ERROR";

/// Environment variable and the [`LayoutConfig::set_option`] key it feeds.
const ENV_OPTIONS: [(&str, &str); 11] = [
    (LOG_LAYOUT_CHARSET_ENV, "charset"),
    (LOG_LAYOUT_LINE_SEPARATOR_ENV, "lineSeparator"),
    (LOG_LAYOUT_STACK_TRACE_SEPARATOR_ENV, "stackTraceLineSeparator"),
    (LOG_LAYOUT_BUILDER_CONFIGURER_ENV, "builderConfigurer"),
    (LOG_LAYOUT_FIELD_SEQUENCE_NUMBER_ENV, "propertySequenceNumber"),
    (LOG_LAYOUT_FIELD_TIMESTAMP_ENV, "propertyTimestamp"),
    (LOG_LAYOUT_FIELD_THREAD_ENV, "propertyThread"),
    (LOG_LAYOUT_FIELD_LEVEL_ENV, "propertyLevel"),
    (LOG_LAYOUT_FIELD_LOGGER_ENV, "propertyLogger"),
    (LOG_LAYOUT_FIELD_MESSAGE_ENV, "propertyMessage"),
    (LOG_LAYOUT_FIELD_ERROR_ENV, "propertyError"),
];

/// Build a [`LayoutConfig`] from defaults overridden by any `LOG_LAYOUT_*`
/// variables that are set.
pub fn config_from_env() -> Result<LayoutConfig, ConfigError> {
    config_from_lookup(|key| std::env::var(key).ok())
}

/// Same as [`config_from_env`] with a custom variable source.
pub fn config_from_lookup<F>(lookup: F) -> Result<LayoutConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = LayoutConfig::default();
    for (var, option) in ENV_OPTIONS {
        if let Some(value) = lookup(var) {
            config.set_option(option, &value)?;
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Charset;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (LOG_LAYOUT_CHARSET_ENV, "ISO-8859-1"),
            (LOG_LAYOUT_LINE_SEPARATOR_ENV, "\""),
            (LOG_LAYOUT_FIELD_LOGGER_ENV, "target"),
            (LOG_LAYOUT_BUILDER_CONFIGURER_ENV, "no-html-escaping"),
        ]);
        let config = config_from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.charset(), Charset::Iso8859_1);
        assert_eq!(config.line_separator(), "");
        assert_eq!(config.field_names().logger, "target");
        assert_eq!(config.field_names().thread, "thread");
        assert_eq!(config.builder_configurer(), Some("no-html-escaping"));
    }

    #[test]
    fn bad_charset_fails() {
        let result = config_from_lookup(|k| (k == LOG_LAYOUT_CHARSET_ENV).then(|| "KOI9".to_string()));
        assert!(matches!(result, Err(ConfigError::UnknownCharset(_))));
    }
}
