use super::{insert_opt, ResourceClient};
use crate::error::CrmError;
use crate::gateway::Gateway;
use crate::resources::Module;
use crate::shared::batch::BatchStatus;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::io::Read;
use std::path::Path;

/// CSV header to contact field used when no mapping file is given.
pub const DEFAULT_IMPORT_MAPPING: &[(&str, &str)] = &[
    ("First Name", "First_Name"),
    ("Last Name", "Last_Name"),
    ("Email", "Email"),
    ("Phone", "Phone"),
    ("Company", "Account_Name"),
    ("Source", "Lead_Source"),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub company_id: Option<String>,
    pub source: Option<String>,
}

impl NewContact {
    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        if self.last_name.trim().is_empty() {
            return Err(CrmError::InvalidArgument(
                "contact last name must be non-empty".to_string(),
            ));
        }
        let mut fields = Map::new();
        fields.insert("First_Name".to_string(), json!(self.first_name));
        fields.insert("Last_Name".to_string(), json!(self.last_name));
        insert_opt(&mut fields, "Email", self.email.clone());
        insert_opt(&mut fields, "Phone", self.phone.clone());
        match (&self.company_id, &self.company) {
            (Some(id), _) => {
                fields.insert("Account_Name".to_string(), json!({ "id": id }));
            }
            (None, Some(name)) => {
                fields.insert("Account_Name".to_string(), json!(name));
            }
            (None, None) => {}
        }
        insert_opt(&mut fields, "Lead_Source", self.source.clone());
        Ok(fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactUpdate {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<String>,
}

impl ContactUpdate {
    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        let mut fields = Map::new();
        insert_opt(&mut fields, "Email", self.email.clone());
        insert_opt(&mut fields, "Phone", self.phone.clone());
        if let Some(id) = &self.company_id {
            fields.insert("Account_Name".to_string(), json!({ "id": id }));
        }
        if fields.is_empty() {
            return Err(CrmError::InvalidArgument(
                "contact update needs at least one field".to_string(),
            ));
        }
        Ok(fields)
    }
}

pub fn client(gateway: &Gateway) -> ResourceClient<'_> {
    ResourceClient::new(gateway, Module::Contacts)
}

pub fn create(gateway: &Gateway, contact: &NewContact) -> Result<Value, CrmError> {
    client(gateway).create(contact.to_fields()?)
}

pub fn update(gateway: &Gateway, contact_id: &str, update: &ContactUpdate) -> Result<Value, CrmError> {
    client(gateway).update(contact_id, update.to_fields()?)
}

/// Which CSV column feeds which contact field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping(Vec<(String, String)>);

impl Default for ColumnMapping {
    fn default() -> Self {
        Self(
            DEFAULT_IMPORT_MAPPING
                .iter()
                .map(|(column, field)| (column.to_string(), field.to_string()))
                .collect(),
        )
    }
}

impl ColumnMapping {
    /// Parses a JSON object of `"CSV column": "Field_Name"` pairs.
    pub fn from_json(raw: &str) -> Result<Self, CrmError> {
        let entries: Map<String, Value> =
            serde_json::from_str(raw).map_err(|source| CrmError::Parse {
                context: "column mapping".to_string(),
                source,
            })?;
        let mut pairs = Vec::with_capacity(entries.len());
        for (column, field) in entries {
            let Some(field) = field.as_str().map(str::trim).filter(|f| !f.is_empty()) else {
                return Err(CrmError::InvalidArgument(format!(
                    "column mapping for `{column}` must name a contact field"
                )));
            };
            pairs.push((column, field.to_string()));
        }
        if pairs.is_empty() {
            return Err(CrmError::InvalidArgument(
                "column mapping must map at least one column".to_string(),
            ));
        }
        Ok(Self(pairs))
    }

    pub fn load(path: &Path) -> Result<Self, CrmError> {
        let raw = fs::read_to_string(path).map_err(|err| CrmError::io(path, err))?;
        Self::from_json(&raw)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// Outcome of one CSV data row. `row` counts data rows from 1, header
/// excluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRow {
    pub row: usize,
    pub status: BatchStatus,
    pub fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportRow {
    fn new(row: usize, status: BatchStatus, fields: Map<String, Value>) -> Self {
        Self {
            row,
            status,
            fields,
            result: None,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == BatchStatus::Error
    }
}

/// Creates one contact per CSV row. Rows that fail to parse or to create are
/// recorded as errors; rows with no mapped values are skipped. Only an
/// unreadable header aborts the import.
pub fn import_csv<R: Read>(
    gateway: &Gateway,
    input: R,
    mapping: &ColumnMapping,
) -> Result<Vec<ImportRow>, CrmError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader
        .headers()
        .map_err(|err| CrmError::csv("header read", err))?
        .clone();
    let columns: Vec<(usize, &str)> = mapping
        .pairs()
        .iter()
        .filter_map(|(column, field)| {
            headers
                .iter()
                .position(|header| header == column)
                .map(|index| (index, field.as_str()))
        })
        .collect();
    if columns.is_empty() {
        tracing::warn!("no csv column matches the import mapping");
    }

    let contacts = client(gateway);
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let mut failed = ImportRow::new(row, BatchStatus::Error, Map::new());
                failed.error = Some(err.to_string());
                rows.push(failed);
                continue;
            }
        };
        let mut fields = Map::new();
        for (position, field) in &columns {
            if let Some(value) = record.get(*position).filter(|value| !value.is_empty()) {
                fields.insert(field.to_string(), json!(value));
            }
        }
        if fields.is_empty() {
            rows.push(ImportRow::new(row, BatchStatus::Skipped, fields));
            continue;
        }
        let mut outcome = ImportRow::new(row, BatchStatus::Created, fields.clone());
        match contacts.create(fields) {
            Ok(result) => outcome.result = Some(result),
            Err(err) => {
                tracing::warn!(row, error = %err, "contact import row failed");
                outcome.status = BatchStatus::Error;
                outcome.error = Some(err.to_string());
            }
        }
        rows.push(outcome);
    }
    tracing::info!(rows = rows.len(), "contact import finished");
    Ok(rows)
}

pub fn import_csv_file(
    gateway: &Gateway,
    path: &Path,
    mapping: &ColumnMapping,
) -> Result<Vec<ImportRow>, CrmError> {
    let file = fs::File::open(path).map_err(|err| CrmError::io(path, err))?;
    import_csv(gateway, file, mapping)
}
