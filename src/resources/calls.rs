use super::{envelope_of, insert_opt, ListQuery, RelatedTo, ResourceClient};
use crate::error::CrmError;
use crate::gateway::{Criteria, Gateway};
use crate::resources::Module;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallType {
    #[default]
    Outbound,
    Inbound,
}

impl CallType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outbound => "Outbound",
            Self::Inbound => "Inbound",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CrmError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "outbound" => Ok(Self::Outbound),
            "inbound" => Ok(Self::Inbound),
            _ => Err(CrmError::InvalidArgument(format!(
                "call type must be Outbound or Inbound (got `{raw}`)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCall {
    pub subject: String,
    pub related_to: Option<RelatedTo>,
    pub call_type: CallType,
    pub duration_minutes: u32,
    pub outcome: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
}

impl NewCall {
    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        if self.subject.trim().is_empty() {
            return Err(CrmError::InvalidArgument(
                "call subject must be non-empty".to_string(),
            ));
        }
        let mut fields = Map::new();
        fields.insert("Subject".to_string(), json!(self.subject));
        fields.insert("Call_Type".to_string(), json!(self.call_type.as_str()));
        fields.insert(
            "Call_Duration".to_string(),
            json!(format!("{}:00", self.duration_minutes)),
        );
        insert_opt(&mut fields, "Call_Result", self.outcome.clone());
        insert_opt(&mut fields, "Description", self.description.clone());
        if let Some(owner) = &self.owner {
            fields.insert("Owner".to_string(), json!({ "email": owner }));
        }
        if let Some(related) = &self.related_to {
            related.apply_to(&mut fields);
        }
        Ok(fields)
    }
}

pub fn client(gateway: &Gateway) -> ResourceClient<'_> {
    ResourceClient::new(gateway, Module::Calls)
}

pub fn create(gateway: &Gateway, call: &NewCall) -> Result<Value, CrmError> {
    client(gateway).create(call.to_fields()?)
}

/// Calls related to a record, optionally narrowed to one direction.
pub fn list(
    gateway: &Gateway,
    related_to: Option<&RelatedTo>,
    call_type: Option<CallType>,
    limit: u32,
) -> Result<Value, CrmError> {
    let mut criteria = Criteria::new();
    if let Some(related) = related_to {
        criteria = criteria.equals("What_Id", related.record_id.clone());
    }
    let records = client(gateway)
        .list_records(&ListQuery::with_limit(limit).criteria(criteria))?
        .into_iter()
        .filter(|record| match call_type {
            Some(kind) => record.str_field("Call_Type") == Some(kind.as_str()),
            None => true,
        })
        .collect();
    Ok(envelope_of(records))
}

/// Logs a call of `call_type` against a contact.
pub fn log_for_contact(
    gateway: &Gateway,
    contact_id: &str,
    call_type: CallType,
    subject: &str,
    duration_minutes: u32,
    outcome: Option<String>,
) -> Result<Value, CrmError> {
    create(
        gateway,
        &NewCall {
            subject: subject.to_string(),
            related_to: Some(RelatedTo::new(Module::Contacts, contact_id)),
            call_type,
            duration_minutes,
            outcome,
            ..NewCall::default()
        },
    )
}
