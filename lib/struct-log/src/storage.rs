use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::redact::Redactor;

/// Field values of an event or span, redacted as they are recorded.
pub struct FieldsStorage {
    redactor: Arc<Redactor>,
    fields: HashMap<&'static str, Value>,
}

impl FieldsStorage {
    pub fn new(redactor: Arc<Redactor>) -> Self {
        Self {
            redactor,
            fields: HashMap::new(),
        }
    }

    pub fn values(&self) -> &HashMap<&'static str, Value> {
        &self.fields
    }

    fn insert(&mut self, field: &Field, value: Value) {
        let value = self.redactor.redact(field.name(), &value);
        self.fields.insert(field.name(), value);
    }
}

impl Visit for FieldsStorage {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_owned()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.insert(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

/// Keeps redacted span fields in span extensions so events can report them.
pub struct StorageLayer {
    redactor: Arc<Redactor>,
}

impl StorageLayer {
    pub fn new(redactor: Arc<Redactor>) -> Self {
        Self { redactor }
    }
}

impl Default for StorageLayer {
    fn default() -> Self {
        Self::new(Arc::new(Redactor::default()))
    }
}

impl<S> Layer<S> for StorageLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &tracing::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut storage = FieldsStorage::new(Arc::clone(&self.redactor));
            attrs.record(&mut storage);
            span.extensions_mut().insert(storage);
        }
    }

    fn on_record(&self, id: &tracing::Id, values: &Record<'_>, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(storage) = span.extensions_mut().get_mut::<FieldsStorage>() {
                values.record(storage);
            }
        }
    }
}
