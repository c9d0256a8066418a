use crate::error::LayoutError;
use crate::extras::{self, ExtraValue};
use crate::layout::JsonLineLayout;
use crate::record::{LogEvent, ThrowableChain};
use chrono::Utc;
use std::collections::BTreeMap;
use std::error::Error;
use std::io::{self, Write};
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that renders every event as one JSON line
/// through a [`JsonLineLayout`] and writes it to a [`MakeWriter`].
///
/// Extras come from the active extras mapping of the calling thread or
/// task, overlaid with the event's own fields. The first field recorded as
/// an error becomes the event's exception chain.
pub struct JsonLineLayer<W = fn() -> io::Stdout> {
    layout: Arc<JsonLineLayout>,
    make_writer: W,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Lines fully written.
    pub written_events: Arc<AtomicU64>,
    /// Events whose line could not be encoded or written.
    pub failed_events: Arc<AtomicU64>,
}

impl JsonLineLayer {
    /// Layer writing to stdout.
    pub fn new(layout: JsonLineLayout) -> Self {
        Self::with_writer(layout, io::stdout)
    }
}

impl<W> JsonLineLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    /// Layer writing to writers produced by `make_writer`.
    pub fn with_writer(layout: JsonLineLayout, make_writer: W) -> Self {
        Self {
            layout: Arc::new(layout),
            make_writer,
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn layout(&self) -> &JsonLineLayout {
        &self.layout
    }
}

impl<S, W> Layer<S> for JsonLineLayer<W>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut fields = extras::active_extras()
            .map(|e| e.snapshot())
            .unwrap_or_default();
        let mut message: Option<String> = None;
        let mut throwable: Option<ThrowableChain> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
            throwable: &mut throwable,
        };
        event.record(&mut visitor);

        let meta = event.metadata();
        let record = LogEvent {
            timestamp_millis: Utc::now().timestamp_millis(),
            thread_name: std::thread::current().name().map(|s| s.to_string()),
            level: Some(*meta.level()),
            logger_name: Some(meta.target().to_string()),
            formatted_message: message,
            throwable,
        };

        match self.write_line(&record, &fields, meta) {
            Ok(()) => {
                self.written_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("cannot write log line: {}", e);
            }
        }
    }
}

impl<W> JsonLineLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    /// Render the whole line before touching the writer, then hand it over
    /// in one `write_all` so concurrent events never interleave.
    fn write_line(
        &self,
        record: &LogEvent,
        fields: &BTreeMap<String, ExtraValue>,
        meta: &Metadata<'_>,
    ) -> Result<(), LayoutError> {
        let line = self.layout.layout_with_extras(record, Some(fields))?;
        let mut writer = self.make_writer.make_writer_for(meta);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, ExtraValue>,
    pub message: &'a mut Option<String>,
    pub throwable: &'a mut Option<ThrowableChain>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), ExtraValue::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), ExtraValue::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), ExtraValue::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), ExtraValue::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), ExtraValue::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.throwable.is_none() {
            *self.throwable = Some(ThrowableChain::from_dyn_error(value));
        } else {
            self.fields.insert(field.name().to_string(), ExtraValue::from(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), ExtraValue::String(format!("{:?}", value)));
        }
    }
}
