use std::fmt;
use std::str::FromStr;

use crate::encoder::ConfigurerRegistry;
use crate::error::ConfigError;
use crate::layout::JsonLineLayout;

/// Platform line separator, used by default for both separators.
pub const LINE_SEPARATOR: &str = if cfg!(windows) { "\r\n" } else { "\n" };

pub const FIELD_SEQUENCE_NUMBER: &str = "sequenceNumber";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_THREAD: &str = "thread";
pub const FIELD_LEVEL: &str = "level";
pub const FIELD_LOGGER: &str = "logger";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_ERROR: &str = "error";

/// Output names of the seven fixed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    pub sequence_number: String,
    pub timestamp: String,
    pub thread: String,
    pub level: String,
    pub logger: String,
    pub message: String,
    pub error: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            sequence_number: FIELD_SEQUENCE_NUMBER.to_string(),
            timestamp: FIELD_TIMESTAMP.to_string(),
            thread: FIELD_THREAD.to_string(),
            level: FIELD_LEVEL.to_string(),
            logger: FIELD_LOGGER.to_string(),
            message: FIELD_MESSAGE.to_string(),
            error: FIELD_ERROR.to_string(),
        }
    }
}

impl FieldNames {
    /// Whether `key` is one of the fixed names. Extras with such a key are
    /// dropped from the output.
    pub fn contains(&self, key: &str) -> bool {
        [
            &self.sequence_number,
            &self.timestamp,
            &self.thread,
            &self.level,
            &self.logger,
            &self.message,
            &self.error,
        ]
        .iter()
        .any(|name| name.as_str() == key)
    }
}

/// Character encoding used by [`JsonLineLayout::layout_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Utf16Be,
    Utf16Le,
    Iso8859_1,
    UsAscii,
}

impl Charset {
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Utf16Be => "UTF-16BE",
            Charset::Utf16Le => "UTF-16LE",
            Charset::Iso8859_1 => "ISO-8859-1",
            Charset::UsAscii => "US-ASCII",
        }
    }

    /// Encode `text`, replacing characters the charset cannot represent
    /// with `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => text.as_bytes().to_vec(),
            Charset::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Charset::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Charset::Iso8859_1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Charset::UsAscii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl FromStr for Charset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Charset::Utf8),
            "UTF-16BE" | "UTF16BE" => Ok(Charset::Utf16Be),
            "UTF-16LE" | "UTF16LE" => Ok(Charset::Utf16Le),
            "ISO-8859-1" | "ISO8859-1" | "LATIN1" => Ok(Charset::Iso8859_1),
            "US-ASCII" | "ASCII" => Ok(Charset::UsAscii),
            _ => Err(ConfigError::UnknownCharset(s.to_string())),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strip one leading and one trailing `"` from a configured separator.
///
/// Host configuration formats trim whitespace, so separators are written
/// quoted. A lone `"` stands for the empty separator.
pub fn unquote(raw: &str) -> &str {
    if raw == "\"" {
        return "";
    }
    let raw = raw.strip_prefix('"').unwrap_or(raw);
    raw.strip_suffix('"').unwrap_or(raw)
}

/// Settings of a [`JsonLineLayout`] before it starts.
///
/// [`start`](Self::start) consumes the config, so nothing can be changed
/// once the layout is usable.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    charset: Charset,
    line_separator: String,
    stack_trace_separator: String,
    field_names: FieldNames,
    builder_configurer: Option<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            charset: Charset::Utf8,
            line_separator: LINE_SEPARATOR.to_string(),
            stack_trace_separator: LINE_SEPARATOR.to_string(),
            field_names: FieldNames::default(),
            builder_configurer: None,
        }
    }
}

impl LayoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Separator written after each JSON object, quoting rule of [`unquote`].
    pub fn with_line_separator(mut self, raw: &str) -> Self {
        self.line_separator = unquote(raw).to_string();
        self
    }

    /// Separator between lines of a flattened exception chain, quoting rule
    /// of [`unquote`].
    pub fn with_stack_trace_separator(mut self, raw: &str) -> Self {
        self.stack_trace_separator = unquote(raw).to_string();
        self
    }

    pub fn with_field_names(mut self, names: FieldNames) -> Self {
        self.field_names = names;
        self
    }

    /// Name of a configurer registered in the [`ConfigurerRegistry`]
    /// passed to [`start`](Self::start).
    pub fn with_builder_configurer(mut self, name: impl Into<String>) -> Self {
        self.builder_configurer = Some(name.into());
        self
    }

    /// Apply one textual option, as found in a host configuration file.
    ///
    /// Keys: `charset`, `lineSeparator`, `stackTraceLineSeparator`,
    /// `propertySequenceNumber`, `propertyTimestamp`, `propertyThread`,
    /// `propertyLevel`, `propertyLogger`, `propertyMessage`,
    /// `propertyError`, `builderConfigurer`.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let names = &mut self.field_names;
        match key {
            "charset" => self.charset = value.parse()?,
            "lineSeparator" => self.line_separator = unquote(value).to_string(),
            "stackTraceLineSeparator" => self.stack_trace_separator = unquote(value).to_string(),
            "propertySequenceNumber" => names.sequence_number = value.to_string(),
            "propertyTimestamp" => names.timestamp = value.to_string(),
            "propertyThread" => names.thread = value.to_string(),
            "propertyLevel" => names.level = value.to_string(),
            "propertyLogger" => names.logger = value.to_string(),
            "propertyMessage" => names.message = value.to_string(),
            "propertyError" => names.error = value.to_string(),
            "builderConfigurer" => self.builder_configurer = Some(value.to_string()),
            _ => return Err(ConfigError::UnknownOption(key.to_string())),
        }
        Ok(())
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn line_separator(&self) -> &str {
        &self.line_separator
    }

    pub fn stack_trace_separator(&self) -> &str {
        &self.stack_trace_separator
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.field_names
    }

    pub fn builder_configurer(&self) -> Option<&str> {
        self.builder_configurer.as_deref()
    }

    /// Resolve the builder configurer and freeze everything into a layout.
    ///
    /// Any resolution failure is returned here rather than on first use.
    pub fn start(self, registry: &ConfigurerRegistry) -> Result<JsonLineLayout, ConfigError> {
        let encoder = registry.build_options(self.builder_configurer.as_deref())?;
        Ok(JsonLineLayout::new(
            self.field_names,
            self.line_separator,
            self.stack_trace_separator,
            self.charset,
            encoder,
        ))
    }
}
