//! JSON layer producing one structured record per event.
//!
//! Record fields: timestamp (RFC 3339, microseconds), level, service, pid,
//! target, message, the event's structured fields, and the innermost span
//! name when there is one.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// A single structured log record.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: String,
    pub service: String,
    pub pid: u32,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
}

#[derive(Default)]
struct FieldVisitor {
    fields: BTreeMap<String, serde_json::Value>,
    message: Option<String>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.insert(field, serde_json::Value::String(text));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, serde_json::Value::String(value.to_string()));
    }
}

/// Layer that serializes every event as a JSON line.
pub struct JsonLayer<W> {
    service_name: String,
    pid: u32,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub fn new(service_name: String, make_writer: W) -> Self {
        Self {
            service_name,
            pid: std::process::id(),
            make_writer,
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let record = LogRecord {
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            level: metadata.level().to_string(),
            service: self.service_name.clone(),
            pid: self.pid,
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
            span: ctx.event_span(event).map(|s| s.name().to_string()),
        };

        if let Ok(json) = serde_json::to_string(&record) {
            let mut writer = self.make_writer.make_writer();
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization_skips_empty() {
        let record = LogRecord {
            timestamp: "2026-01-15T10:30:00.000000Z".to_string(),
            level: "WARN".to_string(),
            service: "emcdi".to_string(),
            pid: 4242,
            target: "emcdi_engine::dispatch".to_string(),
            message: "dropping frame".to_string(),
            fields: BTreeMap::new(),
            span: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"service\":\"emcdi\""));
        assert!(json.contains("\"pid\":4242"));
        assert!(!json.contains("fields"));
        assert!(!json.contains("span"));
    }

    #[test]
    fn test_record_serialization_with_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("seq".to_string(), serde_json::Value::from(7u64));
        fields.insert("channel".to_string(), serde_json::Value::from("control"));
        let record = LogRecord {
            timestamp: String::new(),
            level: "DEBUG".to_string(),
            service: "emcdi".to_string(),
            pid: 1,
            target: "t".to_string(),
            message: "m".to_string(),
            fields,
            span: Some("soak".to_string()),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"fields\":{\"channel\":\"control\",\"seq\":7}"));
        assert!(json.contains("\"span\":\"soak\""));
    }
}
