//! Event to JSON line serialization.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicI64, Ordering};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::Level;

use crate::chain;
use crate::config::{Charset, FieldNames};
use crate::encoder::EncoderOptions;
use crate::error::LayoutError;
use crate::extras::{self, ExtraValue};
use crate::record::LogEvent;

static SEQUENCE: AtomicI64 = AtomicI64::new(i64::MIN);

/// Take the next process-wide sequence number. Wraps on overflow.
///
/// Lines render it with `{:x}`, i.e. the unsigned two's-complement bits, so
/// the first value is `8000000000000000` and never carries a `-` sign.
pub fn next_sequence_number() -> i64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Started layout: turns [`LogEvent`]s into single JSON lines.
///
/// Built by [`LayoutConfig::start`](crate::config::LayoutConfig::start).
/// Cheap to share between threads; every call only touches the global
/// sequence counter.
#[derive(Debug, Clone)]
pub struct JsonLineLayout {
    field_names: FieldNames,
    line_separator: String,
    stack_trace_separator: String,
    charset: Charset,
    encoder: EncoderOptions,
}

impl JsonLineLayout {
    pub(crate) fn new(
        field_names: FieldNames,
        line_separator: String,
        stack_trace_separator: String,
        charset: Charset,
        encoder: EncoderOptions,
    ) -> Self {
        JsonLineLayout {
            field_names,
            line_separator,
            stack_trace_separator,
            charset,
            encoder,
        }
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.field_names
    }

    pub fn line_separator(&self) -> &str {
        &self.line_separator
    }

    pub fn stack_trace_separator(&self) -> &str {
        &self.stack_trace_separator
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn encoder(&self) -> &EncoderOptions {
        &self.encoder
    }

    /// Render `event` with the extras active on the current thread or task.
    pub fn layout(&self, event: &LogEvent) -> Result<String, LayoutError> {
        let extras = extras::active_extras().map(|e| e.snapshot());
        self.layout_with_extras(event, extras.as_ref())
    }

    /// Render `event` with an explicit extras snapshot.
    pub fn layout_with_extras(
        &self,
        event: &LogEvent,
        extras: Option<&BTreeMap<String, ExtraValue>>,
    ) -> Result<String, LayoutError> {
        let mut out = Vec::with_capacity(256);
        self.layout_with_extras_to(event, extras, &mut out)?;
        // Only serde_json output and `&str` separators were written.
        String::from_utf8(out).map_err(|e| LayoutError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Render `event` in the configured charset.
    pub fn layout_bytes(&self, event: &LogEvent) -> Result<Vec<u8>, LayoutError> {
        let line = self.layout(event)?;
        Ok(self.charset.encode(&line))
    }

    /// Stream the line for `event` into `writer` as UTF-8.
    pub fn layout_to<W: Write>(&self, event: &LogEvent, writer: W) -> Result<(), LayoutError> {
        let extras = extras::active_extras().map(|e| e.snapshot());
        self.layout_with_extras_to(event, extras.as_ref(), writer)
    }

    /// Stream the line for `event` into `writer` with an explicit extras
    /// snapshot. Writer failures come back as [`LayoutError::Io`].
    pub fn layout_with_extras_to<W: Write>(
        &self,
        event: &LogEvent,
        extras: Option<&BTreeMap<String, ExtraValue>>,
        mut writer: W,
    ) -> Result<(), LayoutError> {
        let names = &self.field_names;
        let sequence = format!("{:x}", next_sequence_number());
        let error = chain::flatten(event.throwable.as_ref(), &self.stack_trace_separator);

        let mut ser = serde_json::Serializer::with_formatter(&mut writer, self.encoder.formatter());
        let mut map = (&mut ser).serialize_map(None)?;

        map.serialize_entry(&names.sequence_number, &sequence)?;
        map.serialize_entry(&names.timestamp, &event.timestamp_millis)?;
        map.serialize_entry(&names.thread, event.thread_name.as_deref().unwrap_or(""))?;
        map.serialize_entry(&names.level, event.level.unwrap_or(Level::TRACE).as_str())?;
        map.serialize_entry(&names.logger, event.logger_name.as_deref().unwrap_or(""))?;
        map.serialize_entry(&names.message, event.formatted_message.as_deref().unwrap_or(""))?;

        if let Some(error) = &error {
            map.serialize_entry(&names.error, error)?;
        }

        for (key, value) in extras.into_iter().flatten() {
            if names.contains(key) {
                continue;
            }
            map.serialize_entry(
                key,
                &EncodedValue {
                    value,
                    encoder: &self.encoder,
                },
            )?;
        }

        map.end()?;

        writer.write_all(self.line_separator.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// [`ExtraValue`] paired with the encoder settings it is rendered with.
struct EncodedValue<'a> {
    value: &'a ExtraValue,
    encoder: &'a EncoderOptions,
}

impl Serialize for EncodedValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            ExtraValue::Null => serializer.serialize_unit(),
            ExtraValue::String(v) => serializer.serialize_str(v),
            ExtraValue::Integer(v) => serializer.serialize_i64(*v),
            ExtraValue::Float(v) => serializer.serialize_f64(*v),
            ExtraValue::Bool(v) => serializer.serialize_bool(*v),
            ExtraValue::Number(v) => v.serialize(serializer),
            ExtraValue::DateTime(v) => serializer.serialize_str(&self.encoder.format_date(v)),
            ExtraValue::Structured(v) => v.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::encoder::ConfigurerRegistry;
    use crate::extras::run_with_extras;
    use crate::record::{ThrowableChain, ThrowableFrame};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn layout(config: LayoutConfig) -> JsonLineLayout {
        config.start(&ConfigurerRegistry::with_builtins()).unwrap()
    }

    fn default_layout() -> JsonLineLayout {
        layout(LayoutConfig::new().with_line_separator("\"\n\""))
    }

    /// Top-level keys in document order. `serde_json::Map` is sorted, so
    /// the order is recovered from the text.
    fn keys(line: &str) -> Vec<String> {
        let object: serde_json::Map<String, Value> = serde_json::from_str(line).unwrap();
        let mut positions: Vec<(usize, String)> = object
            .keys()
            .map(|k| (line.find(&format!("\"{k}\":")).unwrap(), k.clone()))
            .collect();
        positions.sort();
        positions.into_iter().map(|(_, k)| k).collect()
    }

    #[test]
    fn scenario_without_logger_or_level() {
        let event = LogEvent::new(1_700_000_000_123)
            .with_thread("worker-1")
            .with_message("boot");

        let line = run_with_extras(|extras| {
            extras.insert("env", "prod");
            extras.insert("retries", 2i64);
            default_layout().layout(&event).unwrap()
        });

        assert!(line.ends_with("}\n"));
        assert_eq!(line.matches('\n').count(), 1);

        let json: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["logger"], "");
        assert_eq!(json["thread"], "worker-1");
        assert_eq!(json["level"], "TRACE");
        assert_eq!(json["message"], "boot");
        assert_eq!(json["timestamp"], 1_700_000_000_123i64);
        assert_eq!(json["env"], "prod");
        assert!(json["retries"].is_i64());
        assert!(json.get("error").is_none());
        assert!(line.contains("\"retries\":2}"));

        assert_eq!(
            keys(&line),
            ["sequenceNumber", "timestamp", "thread", "level", "logger", "message", "env", "retries"]
        );
    }

    #[test]
    fn missing_fields_use_defaults() {
        let line = default_layout().layout_with_extras(&LogEvent::new(0), None).unwrap();
        let json: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(json["thread"], "");
        assert_eq!(json["logger"], "");
        assert_eq!(json["message"], "");
        assert_eq!(json["level"], "TRACE");
        assert_eq!(json.as_object().unwrap().len(), 6);
    }

    #[test]
    fn error_field_follows_message() {
        let mut chain = ThrowableChain::new();
        chain.push(ThrowableFrame::new("Boom", Some("failed".into())).with_stack(["f()"]));
        let event = LogEvent::new(1)
            .with_level(Level::ERROR)
            .with_logger("app")
            .with_message("oops")
            .with_throwable(chain);

        let layout = layout(LayoutConfig::new().with_stack_trace_separator("\" | \""));
        let line = layout.layout_with_extras(&event, None).unwrap();
        let json: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(json["error"], "Boom: failed | \tf()");
        assert_eq!(json["level"], "ERROR");
        assert_eq!(
            keys(&line),
            ["sequenceNumber", "timestamp", "thread", "level", "logger", "message", "error"]
        );
    }

    #[test]
    fn extras_never_override_fixed_fields() {
        let mut extras = BTreeMap::new();
        extras.insert("message".to_string(), ExtraValue::from("spoofed"));
        extras.insert("msg".to_string(), ExtraValue::from("renamed away"));
        extras.insert("level".to_string(), ExtraValue::from(1i64));
        extras.insert("user".to_string(), ExtraValue::from("u-1"));

        let mut names = FieldNames::default();
        names.message = "msg".to_string();
        let layout = layout(LayoutConfig::new().with_field_names(names));

        let event = LogEvent::new(1).with_message("real");
        let line = layout.layout_with_extras(&event, Some(&extras)).unwrap();
        let json: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(json["msg"], "real");
        assert_eq!(line.matches("\"msg\"").count(), 1);
        assert_eq!(json["level"], "TRACE");
        assert_eq!(line.matches("\"level\"").count(), 1);
        // Renamed away, so `message` is an ordinary extra now.
        assert_eq!(json["message"], "spoofed");
        assert_eq!(json["user"], "u-1");
    }

    #[test]
    fn integers_and_doubles_keep_their_shape() {
        let mut extras = BTreeMap::new();
        extras.insert("n".to_string(), ExtraValue::from(5i64));
        extras.insert("x".to_string(), ExtraValue::from(5.0f64));
        extras.insert("u".to_string(), ExtraValue::from(7u8));
        extras.insert("nan".to_string(), ExtraValue::from(f64::NAN));
        extras.insert("none".to_string(), ExtraValue::Null);
        extras.insert("flag".to_string(), ExtraValue::from(true));
        extras.insert("nested".to_string(), ExtraValue::from(serde_json::json!({"n": 5, "list": [1.5, "a"]})));

        let line = default_layout().layout_with_extras(&LogEvent::new(1), Some(&extras)).unwrap();

        assert!(line.contains("\"n\":5,"));
        assert!(line.contains("\"x\":5.0"));
        assert!(line.contains("\"u\":7,"));
        assert!(line.contains("\"nan\":null"));
        assert!(line.contains("\"none\":null"));
        assert!(line.contains("\"flag\":true"));
        assert!(line.contains(r#""nested":{"list":[1.5,"a"],"n":5}"#));

        let json: Value = serde_json::from_str(&line).unwrap();
        assert!(json["n"].is_i64());
        assert!(json["x"].is_f64());
    }

    #[test]
    fn date_extras_use_encoder_format() {
        let mut extras = BTreeMap::new();
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        extras.insert("at".to_string(), ExtraValue::from(date));

        let plain = default_layout().layout_with_extras(&LogEvent::new(1), Some(&extras)).unwrap();
        assert!(plain.contains("\"at\":\"2024-01-02T03:04:05.000Z\""));

        let iso = layout(LayoutConfig::new().with_builder_configurer("iso-dates"))
            .layout_with_extras(&LogEvent::new(1), Some(&extras))
            .unwrap();
        assert!(iso.contains("\"at\":\"2024-01-02T03:04:05.000+00:00\""));
    }

    #[test]
    fn separator_quoting() {
        let event = LogEvent::new(1);

        let empty = layout(LayoutConfig::new().with_line_separator("\""));
        assert!(empty.layout_with_extras(&event, None).unwrap().ends_with('}'));

        let x = layout(LayoutConfig::new().with_line_separator("\"X\""));
        assert!(x.layout_with_extras(&event, None).unwrap().ends_with("}X"));

        let multi = layout(LayoutConfig::new().with_line_separator("\n\n"));
        assert!(multi.layout_with_extras(&event, None).unwrap().ends_with("}\n\n"));
    }

    #[test]
    fn renamed_fields_are_emitted_under_new_names() {
        let mut config = LayoutConfig::new();
        config.set_option("propertySequenceNumber", "seq").unwrap();
        config.set_option("propertyTimestamp", "@t").unwrap();
        let line = layout(config).layout_with_extras(&LogEvent::new(9), None).unwrap();

        let json: Value = serde_json::from_str(&line).unwrap();
        assert!(json["seq"].is_string());
        assert_eq!(json["@t"], 9);
        assert!(json.get("sequenceNumber").is_none());
    }

    #[test]
    fn sequence_numbers_are_lower_hex_and_increasing() {
        let layout = default_layout();
        let parse = |line: String| {
            let json: Value = serde_json::from_str(&line).unwrap();
            let hex = json["sequenceNumber"].as_str().unwrap().to_string();
            assert!(!hex.starts_with("0x"));
            assert_eq!(hex, hex.to_lowercase());
            u64::from_str_radix(&hex, 16).unwrap()
        };

        let first = parse(layout.layout_with_extras(&LogEvent::new(1), None).unwrap());
        let second = parse(layout.layout_with_extras(&LogEvent::new(1), None).unwrap());
        assert!(second > first);
    }

    #[test]
    fn pretty_printing_spans_lines() {
        let line = layout(LayoutConfig::new().with_builder_configurer("pretty"))
            .layout_with_extras(&LogEvent::new(1), None)
            .unwrap();
        assert!(line.starts_with("{\n  \"sequenceNumber\": "));
    }

    #[test]
    fn utf16_output_uses_configured_charset() {
        let layout = layout(LayoutConfig::new().with_charset(Charset::Utf16Le).with_line_separator("\""));
        let bytes = layout.layout_bytes(&LogEvent::new(1)).unwrap();
        assert_eq!(&bytes[..2], &[b'{', 0]);
        assert_eq!(&bytes[bytes.len() - 2..], &[b'}', 0]);
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_failures_surface_as_io_errors() {
        let err = default_layout()
            .layout_with_extras_to(&LogEvent::new(1), None, BrokenWriter)
            .unwrap_err();
        match err {
            LayoutError::Io(io) => assert_eq!(io.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
