//! Upstream events and field-reference interpolation.
//!
//! An event is a JSON object. Templates reference its fields with `%{name}`
//! or `%{[nested][name]}`, and its timestamp with `%{+FORMAT}` (chrono
//! strftime, `%{+%s}` for epoch seconds). Interpolation never fails: a
//! reference that cannot be resolved is emitted as its literal text.

use crate::error::{EventError, EventResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// Field holding the event time as an RFC 3339 string.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Field holding the event's main text.
pub const MESSAGE_FIELD: &str = "message";

/// A unit of upstream data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: Map<String, Value>,
}

impl Event {
    /// Create an event carrying `message`, stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(MESSAGE_FIELD.to_string(), Value::String(message.into()));
        fields.insert(TIMESTAMP_FIELD.to_string(), Value::String(now_rfc3339()));
        Self { fields }
    }

    /// Create an event from a JSON object, adding `@timestamp` when absent.
    pub fn from_json(value: Value) -> EventResult<Self> {
        let mut fields = match value {
            Value::Object(map) => map,
            Value::Null => return Err(EventError::NotAnObject("null")),
            Value::Bool(_) => return Err(EventError::NotAnObject("a boolean")),
            Value::Number(_) => return Err(EventError::NotAnObject("a number")),
            Value::String(_) => return Err(EventError::NotAnObject("a string")),
            Value::Array(_) => return Err(EventError::NotAnObject("an array")),
        };

        fields
            .entry(TIMESTAMP_FIELD)
            .or_insert_with(|| Value::String(now_rfc3339()));

        Ok(Self { fields })
    }

    /// Parse an event from a JSON document.
    pub fn from_json_str(raw: &str) -> EventResult<Self> {
        Self::from_json(serde_json::from_str(raw)?)
    }

    /// Set a top-level field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// All fields of the event.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The `message` field, if it is a string.
    pub fn message(&self) -> Option<&str> {
        self.fields.get(MESSAGE_FIELD).and_then(Value::as_str)
    }

    /// Resolve a field reference: `name` or `[outer][inner]`.
    pub fn get(&self, reference: &str) -> Option<&Value> {
        self.get_path(&parse_reference(reference))
    }

    fn get_path(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.fields.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// The event time, if `@timestamp` holds a valid RFC 3339 string.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.fields.get(TIMESTAMP_FIELD)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Interpolate `template` against this event.
    pub fn sprintf(&self, template: &str) -> String {
        Template::parse(template).render(self)
    }
}

/// A pre-parsed interpolation template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { raw: String, path: Vec<String> },
    Time { format: String },
}

impl Template {
    /// Parse a template. Parsing is total: malformed references stay literal.
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(start) = rest.find("%{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };

            literal.push_str(&rest[..start]);
            let inner = &after[..end];

            if inner.is_empty() {
                literal.push_str("%{}");
            } else {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(match inner.strip_prefix('+') {
                    Some(format) => Segment::Time {
                        format: format.to_string(),
                    },
                    None => Segment::Field {
                        raw: inner.to_string(),
                        path: parse_reference(inner),
                    },
                });
            }

            rest = &after[end + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Whether the template contains no references.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Render the template against `event`.
    pub fn render(&self, event: &Event) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { raw, path } => match event.get_path(path) {
                    Some(value) if !value.is_null() => push_value(&mut out, value),
                    _ => {
                        let _ = write!(out, "%{{{}}}", raw);
                    }
                },
                Segment::Time { format } => push_time(&mut out, event, format),
            }
        }
        out
    }
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_value(out, item);
            }
        }
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

fn push_time(out: &mut String, event: &Event, format: &str) {
    let Some(ts) = event.timestamp() else {
        let _ = write!(out, "%{{+{}}}", format);
        return;
    };

    if format == "%s" {
        let _ = write!(out, "{}", ts.timestamp());
        return;
    }

    // Unknown strftime specifiers make chrono's formatter error out.
    let mut rendered = String::new();
    if write!(rendered, "{}", ts.format(format)).is_ok() {
        out.push_str(&rendered);
    } else {
        let _ = write!(out, "%{{+{}}}", format);
    }
}

/// Split `[a][b]` into `["a", "b"]`; a bare name is a single segment.
fn parse_reference(reference: &str) -> Vec<String> {
    let trimmed = reference.trim();
    if !trimmed.starts_with('[') {
        return vec![trimmed.to_string()];
    }

    trimmed
        .split(|c: char| c == '[' || c == ']')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
