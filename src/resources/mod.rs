//! Uniform REST resource access for the CRM modules.
//!
//! Every module exposes the same list/get/create/update/delete/search shape;
//! the entity files only shape field maps for their module.

pub mod calls;
pub mod companies;
pub mod contacts;
pub mod events;
pub mod tasks;

use crate::error::CrmError;
use crate::gateway::{Criteria, Gateway};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Pipelines,
    Contacts,
    Accounts,
    Tasks,
    Events,
    Calls,
}

impl Module {
    pub const ALL: [Module; 6] = [
        Module::Pipelines,
        Module::Contacts,
        Module::Accounts,
        Module::Tasks,
        Module::Events,
        Module::Calls,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pipelines => "Pipelines",
            Self::Contacts => "Contacts",
            Self::Accounts => "Accounts",
            Self::Tasks => "Tasks",
            Self::Events => "Events",
            Self::Calls => "Calls",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CrmError> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|module| module.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                CrmError::InvalidArgument(format!(
                    "unknown module `{trimmed}`; expected one of: {}",
                    Self::ALL.map(Module::as_str).join(", ")
                ))
            })
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `Module:record_id` reference used to relate tasks, events and calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedTo {
    pub module: Module,
    pub record_id: String,
}

impl RelatedTo {
    pub fn new(module: Module, record_id: impl Into<String>) -> Self {
        Self {
            module,
            record_id: record_id.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CrmError> {
        let (module, record_id) = raw.split_once(':').ok_or_else(|| {
            CrmError::InvalidArgument(format!(
                "related record `{raw}` must use the form Module:record_id"
            ))
        })?;
        let record_id = record_id.trim();
        if record_id.is_empty() {
            return Err(CrmError::InvalidArgument(format!(
                "related record `{raw}` is missing a record id"
            )));
        }
        Ok(Self::new(Module::parse(module)?, record_id))
    }

    /// Adds the `What_Id` lookup and `$se_module` marker to `fields`.
    pub fn apply_to(&self, fields: &mut Map<String, Value>) {
        fields.insert("What_Id".to_string(), json!({ "id": self.record_id }));
        fields.insert("$se_module".to_string(), json!(self.module.as_str()));
    }
}

/// A CRM record as an optional-field map. Accessors check presence and type
/// explicitly; an absent or mistyped field is `None`, never a zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    /// Non-empty string value of `key`.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Numeric value of `key`; numeric strings are accepted.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// String value of `field` inside the object stored under `key`, e.g.
    /// `Owner.email`.
    pub fn nested_str(&self, key: &str, field: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|v| v.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Records under the envelope's `data` array; non-object entries are skipped.
pub fn records_from_envelope(envelope: &Value) -> Vec<Record> {
    envelope
        .get("data")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| Record::from_value(item.clone()))
                .collect()
        })
        .unwrap_or_default()
}

pub fn first_record(envelope: &Value) -> Option<Record> {
    records_from_envelope(envelope).into_iter().next()
}

fn data_payload(fields: Map<String, Value>) -> Value {
    json!({ "data": [Value::Object(fields)] })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub per_page: u32,
    pub criteria: Criteria,
    pub fields: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PAGE_SIZE,
            criteria: Criteria::new(),
            fields: None,
        }
    }
}

impl ListQuery {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            per_page: limit.clamp(1, MAX_PAGE_SIZE),
            ..Self::default()
        }
    }

    pub fn criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("per_page", self.per_page.to_string())];
        if let Some(fields) = &self.fields {
            query.push(("fields", fields.clone()));
        }
        if let Some(criteria) = self.criteria.to_wire() {
            query.push(("criteria", criteria));
        }
        query
    }
}

pub struct ResourceClient<'a> {
    gateway: &'a Gateway,
    module: Module,
}

impl<'a> ResourceClient<'a> {
    pub fn new(gateway: &'a Gateway, module: Module) -> Self {
        Self { gateway, module }
    }

    pub fn module(&self) -> Module {
        self.module
    }

    fn record_path(&self, record_id: &str) -> Result<String, CrmError> {
        let record_id = record_id.trim();
        if record_id.is_empty() {
            return Err(CrmError::InvalidArgument(format!(
                "{} record id must be non-empty",
                self.module
            )));
        }
        Ok(format!(
            "{}/{}",
            self.module.as_str(),
            urlencoding::encode(record_id)
        ))
    }

    pub fn list(&self, query: &ListQuery) -> Result<Value, CrmError> {
        self.gateway.get(self.module.as_str(), &query.to_query())
    }

    pub fn list_records(&self, query: &ListQuery) -> Result<Vec<Record>, CrmError> {
        Ok(records_from_envelope(&self.list(query)?))
    }

    pub fn get(&self, record_id: &str) -> Result<Value, CrmError> {
        self.gateway.get(&self.record_path(record_id)?, &[])
    }

    pub fn create(&self, fields: Map<String, Value>) -> Result<Value, CrmError> {
        self.gateway
            .post_json(self.module.as_str(), data_payload(fields))
    }

    pub fn update(&self, record_id: &str, fields: Map<String, Value>) -> Result<Value, CrmError> {
        self.gateway
            .put_json(&self.record_path(record_id)?, data_payload(fields))
    }

    pub fn delete(&self, record_id: &str) -> Result<Value, CrmError> {
        self.gateway.delete(&self.record_path(record_id)?)
    }

    /// Keyword search. The service answers 204 for no matches, which the
    /// gateway turns into an empty envelope.
    pub fn search(&self, word: &str) -> Result<Value, CrmError> {
        if word.trim().is_empty() {
            return Err(CrmError::InvalidArgument(
                "search word must be non-empty".to_string(),
            ));
        }
        self.gateway.get(
            &format!("{}/search", self.module.as_str()),
            &[("word", word.trim().to_string())],
        )
    }
}

/// Inserts `value` under `key` when present.
pub(crate) fn insert_opt<V: Into<Value>>(fields: &mut Map<String, Value>, key: &str, value: Option<V>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), value.into());
    }
}

/// Wraps the envelope's records as `{"data": [...]}` after filtering.
pub(crate) fn envelope_of(records: Vec<Record>) -> Value {
    json!({ "data": records.into_iter().map(Record::into_value).collect::<Vec<_>>() })
}
