use serde::ser::{SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::io::Write;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::redact::Redactor;
use crate::storage::FieldsStorage;

/// Writes each event as one JSON object per line.
pub struct JsonLogLayer<W: for<'a> MakeWriter<'a> + 'static> {
    make_writer: W,
    hostname: String,
    version: String,
    application: String,
    redactor: Arc<Redactor>,
}

const DATE: &str = "date";
const RUNTIME: &str = "runtime";
const APPLICATION: &str = "application";
const LEVEL: &str = "level";
const HOSTNAME: &str = "container_id";
const MESSAGE: &str = "message";
const LOGGER: &str = "logger";
const LINENO: &str = "lineno";
const FILE: &str = "file";
const VERSION: &str = "version";

const RESERVED_FIELDS: [&str; 10] = [
    DATE,
    RUNTIME,
    APPLICATION,
    LEVEL,
    HOSTNAME,
    MESSAGE,
    LOGGER,
    LINENO,
    FILE,
    VERSION,
];

impl<W: for<'a> MakeWriter<'a> + 'static> JsonLogLayer<W> {
    pub fn new(application: String, version: String, make_writer: W) -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        Self::with_hostname(application, version, hostname, make_writer)
    }

    pub fn with_hostname(
        application: String,
        version: String,
        hostname: String,
        make_writer: W,
    ) -> Self {
        Self {
            make_writer,
            hostname,
            version,
            application,
            redactor: Arc::new(Redactor::default()),
        }
    }

    /// Use the same redactor as the [`StorageLayer`](crate::StorageLayer) feeding span fields.
    pub fn with_redactor(mut self, redactor: Arc<Redactor>) -> Self {
        self.redactor = redactor;
        self
    }

    fn serialize_core_fields(
        &self,
        map_serializer: &mut impl SerializeMap<Error = serde_json::Error>,
        message: &str,
        event: &Event<'_>,
    ) -> Result<(), serde_json::Error> {
        let metadata = event.metadata();
        map_serializer.serialize_entry(RUNTIME, "rust")?;
        map_serializer.serialize_entry(APPLICATION, &self.application)?;
        map_serializer.serialize_entry(VERSION, &self.version)?;
        map_serializer.serialize_entry(HOSTNAME, &self.hostname)?;
        if let Ok(date) = time::OffsetDateTime::now_utc().format(&Rfc3339) {
            map_serializer.serialize_entry(DATE, &date)?;
        }
        map_serializer.serialize_entry(LEVEL, &metadata.level().to_string().to_lowercase())?;
        map_serializer.serialize_entry(LOGGER, metadata.target())?;
        map_serializer.serialize_entry(LINENO, &metadata.line())?;
        map_serializer.serialize_entry(FILE, &metadata.file())?;
        map_serializer.serialize_entry(MESSAGE, message)?;
        Ok(())
    }

    fn format<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> Result<Vec<u8>, serde_json::Error>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let mut event_fields = FieldsStorage::new(Arc::clone(&self.redactor));
        event.record(&mut event_fields);

        // Outer spans first so inner spans and the event itself win on conflicts.
        let mut extra = Map::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(storage) = span.extensions().get::<FieldsStorage>() {
                    merge_fields(&mut extra, storage);
                }
            }
        }
        merge_fields(&mut extra, &event_fields);

        let message = match event_fields.values().get(MESSAGE) {
            Some(Value::String(s)) => s.clone(),
            _ => event.metadata().target().to_owned(),
        };

        let mut buffer = Vec::new();
        let mut serializer = serde_json::Serializer::new(&mut buffer);
        let mut map_serializer = serializer.serialize_map(None)?;
        self.serialize_core_fields(&mut map_serializer, &message, event)?;
        for (key, value) in &extra {
            map_serializer.serialize_entry(key, value)?;
        }
        map_serializer.end()?;
        buffer.push(b'\n');
        Ok(buffer)
    }
}

fn merge_fields(target: &mut Map<String, Value>, storage: &FieldsStorage) {
    for (key, value) in storage.values() {
        if !RESERVED_FIELDS.contains(key) {
            target.insert((*key).to_owned(), value.clone());
        }
    }
}

impl<S, W> Layer<S> for JsonLogLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if let Ok(line) = self.format(event, &ctx) {
            let _ = self.make_writer.make_writer().write_all(&line);
        }
    }
}
