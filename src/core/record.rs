//! Record model for forensicstore items.
//!
//! A [`Record`] is the untyped field mapping the store hands out. Every record
//! carries a non-empty `type` discriminator. [`RecordKind`] lifts a record into
//! the explicit shape for its type so plugins never index missing fields.

use crate::core::error::{PluginError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TYPE_FIELD: &str = "type";

pub const REGISTRY_KEY_TYPE: &str = "windows-registry-key";
pub const RUNKEY_TYPE: &str = "runkey";
pub const REPORT_TYPE: &str = "report";

/// An ordered field mapping tagged with a `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Build a record from a field map, rejecting a missing or empty `type`.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self> {
        match fields.get(TYPE_FIELD) {
            Some(Value::String(t)) if !t.is_empty() => Ok(Self { fields }),
            Some(Value::String(_)) => Err(PluginError::MalformedRecord(
                "record has an empty type".to_string(),
            )),
            Some(other) => Err(PluginError::MalformedRecord(format!(
                "record type must be a string, got {}",
                other
            ))),
            None => Err(PluginError::MalformedRecord(
                "record has no type field".to_string(),
            )),
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::from_fields(fields),
            other => Err(PluginError::MalformedRecord(format!(
                "record must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Serialize a typed shape into a record.
    pub fn from_shape<T: Serialize>(shape: &T) -> Result<Self> {
        Self::from_value(serde_json::to_value(shape)?)
    }

    pub fn record_type(&self) -> &str {
        self.fields
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        Record::from_fields(fields).map_err(serde::de::Error::custom)
    }
}

/// One value of a registry key (`name`, `data`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryValue {
    pub name: String,
    pub data: Value,
}

/// A `windows-registry-key` item. `values` stays raw so a single bad entry
/// does not poison the whole key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryKey {
    pub key: String,
    #[serde(default)]
    pub values: Option<Vec<Value>>,
}

/// A derived autostart entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunKey {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Command")]
    pub command: Value,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "SID")]
    pub sid: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl RunKey {
    pub fn new(key: &str, command: Value, name: &str, sid: &str) -> Self {
        Self {
            key: key.to_string(),
            command,
            name: name.to_string(),
            sid: sid.to_string(),
            kind: RUNKEY_TYPE.to_string(),
        }
    }
}

/// A rendered report stored as a file inside the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "type")]
    pub kind: String,
    pub report_path: String,
    pub format: String,
}

impl Report {
    pub fn markdown(report_path: impl Into<String>) -> Self {
        Self {
            kind: REPORT_TYPE.to_string(),
            report_path: report_path.into(),
            format: "markdown".to_string(),
        }
    }
}

/// A record lifted into the shape of its `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordKind {
    RegistryKey(RegistryKey),
    RunKey(RunKey),
    Report(Report),
    Other(Record),
}

impl RecordKind {
    /// Validate a record against the shape registered for its type.
    pub fn classify(record: &Record) -> Result<Self> {
        let value = Value::Object(record.fields().clone());
        let kind = match record.record_type() {
            REGISTRY_KEY_TYPE => RecordKind::RegistryKey(shape_of(record, value)?),
            RUNKEY_TYPE => RecordKind::RunKey(shape_of(record, value)?),
            REPORT_TYPE => RecordKind::Report(shape_of(record, value)?),
            _ => RecordKind::Other(record.clone()),
        };
        Ok(kind)
    }
}

fn shape_of<T: serde::de::DeserializeOwned>(record: &Record, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        PluginError::MalformedRecord(format!("{} item: {}", record.record_type(), e))
    })
}
