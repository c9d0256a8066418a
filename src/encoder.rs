//! JSON encoder settings and the pluggable hook that customizes them.
//!
//! A [`BuilderConfigurer`] is looked up by name in a
//! [`ConfigurerRegistry`] once, when the layout starts, and mutates an
//! [`EncoderBuilder`]. The resulting [`EncoderOptions`] never change
//! afterwards.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};

use crate::error::{BoxError, ConfigError};

/// Hook that customizes the JSON encoder before the layout becomes usable.
pub trait BuilderConfigurer: Send + Sync {
    fn configure(&self, builder: &mut EncoderBuilder);
}

/// Mutable encoder settings, only reachable from a [`BuilderConfigurer`].
#[derive(Debug, Clone)]
pub struct EncoderBuilder {
    indent: Option<String>,
    html_escaping: bool,
    date_format: Option<String>,
}

impl Default for EncoderBuilder {
    fn default() -> Self {
        EncoderBuilder {
            indent: None,
            html_escaping: true,
            date_format: None,
        }
    }
}

impl EncoderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multi-line output indented by two spaces.
    pub fn pretty_printing(&mut self) -> &mut Self {
        self.indent = Some("  ".to_string());
        self
    }

    /// Multi-line output with a custom indent.
    pub fn indent(&mut self, indent: impl Into<String>) -> &mut Self {
        self.indent = Some(indent.into());
        self
    }

    /// Escape `<`, `>`, `&`, `=` and `'` as `\uXXXX` so the output can be
    /// embedded in HTML. On by default.
    pub fn html_escaping(&mut self, enabled: bool) -> &mut Self {
        self.html_escaping = enabled;
        self
    }

    /// `strftime`-style format for date-time extras, see [`chrono::format::strftime`].
    pub fn date_format(&mut self, format: impl Into<String>) -> &mut Self {
        self.date_format = Some(format.into());
        self
    }

    /// Freeze the settings. Fails if the date format cannot be parsed.
    pub fn build(self) -> Result<EncoderOptions, ConfigError> {
        if let Some(format) = &self.date_format {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(ConfigError::InvalidDateFormat(format.clone()));
            }
        }
        Ok(EncoderOptions {
            indent: self.indent,
            html_escaping: self.html_escaping,
            date_format: self.date_format,
        })
    }
}

/// Immutable encoder settings used by every `layout` call.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    indent: Option<String>,
    html_escaping: bool,
    date_format: Option<String>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        let EncoderBuilder {
            indent,
            html_escaping,
            date_format,
        } = EncoderBuilder::default();
        EncoderOptions {
            indent,
            html_escaping,
            date_format,
        }
    }
}

impl EncoderOptions {
    pub fn is_pretty(&self) -> bool {
        self.indent.is_some()
    }

    pub fn html_escaping(&self) -> bool {
        self.html_escaping
    }

    /// Render a date-time extra. Defaults to RFC 3339 with milliseconds.
    pub fn format_date(&self, value: &DateTime<Utc>) -> String {
        match &self.date_format {
            // Validated in `EncoderBuilder::build`, so formatting cannot fail.
            Some(format) => value.format(format).to_string(),
            None => value.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub(crate) fn formatter(&self) -> LineFormatter<'_> {
        LineFormatter {
            pretty: self
                .indent
                .as_ref()
                .map(|indent| PrettyFormatter::with_indent(indent.as_bytes())),
            html_escaping: self.html_escaping,
        }
    }
}

/// `serde_json` formatter that is compact or pretty, with HTML escaping on
/// top of the standard JSON escaping unless disabled.
pub(crate) struct LineFormatter<'a> {
    pretty: Option<PrettyFormatter<'a>>,
    html_escaping: bool,
}

macro_rules! delegate {
    ($($method:ident),*) => {
        $(
            fn $method<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
                match &mut self.pretty {
                    Some(pretty) => pretty.$method(writer),
                    None => CompactFormatter.$method(writer),
                }
            }
        )*
    };
    (first: $($method:ident),*) => {
        $(
            fn $method<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
                match &mut self.pretty {
                    Some(pretty) => pretty.$method(writer, first),
                    None => CompactFormatter.$method(writer, first),
                }
            }
        )*
    };
}

impl Formatter for LineFormatter<'_> {
    delegate!(begin_array, end_array, end_array_value, begin_object, end_object, begin_object_value, end_object_value);
    delegate!(first: begin_array_value, begin_object_key);

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if !self.html_escaping {
            return writer.write_all(fragment.as_bytes());
        }

        let mut start = 0;
        for (i, byte) in fragment.bytes().enumerate() {
            let escaped = match byte {
                b'<' => "\\u003c",
                b'>' => "\\u003e",
                b'&' => "\\u0026",
                b'=' => "\\u003d",
                b'\'' => "\\u0027",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + 1;
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

type Factory = Arc<dyn Fn() -> Result<Box<dyn BuilderConfigurer>, BoxError> + Send + Sync>;

/// Named [`BuilderConfigurer`] factories, resolved when a layout starts.
#[derive(Clone, Default)]
pub struct ConfigurerRegistry {
    factories: HashMap<String, Factory>,
}

impl ConfigurerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `pretty`, `no-html-escaping` and `iso-dates`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register::<PrettyPrinting>("pretty")
            .register::<NoHtmlEscaping>("no-html-escaping")
            .register::<IsoDates>("iso-dates");
        registry
    }

    /// Register a configurer that is built with `Default::default()`.
    pub fn register<C>(&mut self, name: impl Into<String>) -> &mut Self
    where
        C: BuilderConfigurer + Default + 'static,
    {
        self.register_factory(name, || Ok(Box::new(C::default()) as Box<dyn BuilderConfigurer>))
    }

    /// Register a fallible factory. A failure is reported from `start()`.
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn BuilderConfigurer>, BoxError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the configurer registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn BuilderConfigurer>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownConfigurer(name.to_string()))?;

        factory().map_err(|source| ConfigError::ConfigurerInit {
            name: name.to_string(),
            source,
        })
    }

    /// Build encoder options, applying the configurer named `name` if any.
    pub fn build_options(&self, name: Option<&str>) -> Result<EncoderOptions, ConfigError> {
        let mut builder = EncoderBuilder::new();
        if let Some(name) = name {
            self.resolve(name)?.configure(&mut builder);
        }
        builder.build()
    }
}

impl fmt::Debug for ConfigurerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ConfigurerRegistry").field("names", &names).finish()
    }
}

/// Indented multi-line output.
#[derive(Debug, Default)]
pub struct PrettyPrinting;

impl BuilderConfigurer for PrettyPrinting {
    fn configure(&self, builder: &mut EncoderBuilder) {
        builder.pretty_printing();
    }
}

/// Plain JSON string escaping; `<`, `>`, `&`, `=` and `'` are written as is.
#[derive(Debug, Default)]
pub struct NoHtmlEscaping;

impl BuilderConfigurer for NoHtmlEscaping {
    fn configure(&self, builder: &mut EncoderBuilder) {
        builder.html_escaping(false);
    }
}

/// Dates as `2024-05-01T12:30:00.000+00:00`.
#[derive(Debug, Default)]
pub struct IsoDates;

impl BuilderConfigurer for IsoDates {
    fn configure(&self, builder: &mut EncoderBuilder) {
        builder.date_format("%Y-%m-%dT%H:%M:%S%.3f%:z");
    }
}
