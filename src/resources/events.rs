use super::{insert_opt, ListQuery, RelatedTo, ResourceClient};
use crate::error::CrmError;
use crate::gateway::{Criteria, CriteriaOperator, Gateway};
use crate::resources::Module;
use crate::shared::clock::days_after;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};

pub const START_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";
const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

pub fn parse_start(raw: &str) -> Result<NaiveDateTime, CrmError> {
    NaiveDateTime::parse_from_str(raw.trim(), START_INPUT_FORMAT).map_err(|_| {
        CrmError::InvalidArgument(format!(
            "event start `{raw}` must use the form YYYY-MM-DD HH:MM"
        ))
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
    pub related_to: Option<RelatedTo>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub attendees: Vec<String>,
}

impl NewEvent {
    pub fn new(title: impl Into<String>, start: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            start,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            related_to: None,
            location: None,
            description: None,
            attendees: Vec::new(),
        }
    }

    pub fn end(&self) -> Result<NaiveDateTime, CrmError> {
        self.start
            .checked_add_signed(Duration::minutes(i64::from(self.duration_minutes)))
            .ok_or_else(|| {
                CrmError::InvalidArgument(format!(
                    "event duration of {} minutes ends outside the supported date range",
                    self.duration_minutes
                ))
            })
    }

    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        if self.title.trim().is_empty() {
            return Err(CrmError::InvalidArgument(
                "event title must be non-empty".to_string(),
            ));
        }
        let end = self.end()?;
        let mut fields = Map::new();
        fields.insert("Event_Title".to_string(), json!(self.title));
        fields.insert(
            "Start_DateTime".to_string(),
            json!(self.start.format(WIRE_DATETIME_FORMAT).to_string()),
        );
        fields.insert(
            "End_DateTime".to_string(),
            json!(end.format(WIRE_DATETIME_FORMAT).to_string()),
        );
        insert_opt(&mut fields, "Location", self.location.clone());
        insert_opt(&mut fields, "Description", self.description.clone());
        if let Some(related) = &self.related_to {
            related.apply_to(&mut fields);
        }
        if !self.attendees.is_empty() {
            let participants = self
                .attendees
                .iter()
                .map(|email| json!({ "email": email }))
                .collect::<Vec<_>>();
            fields.insert("Participants".to_string(), Value::Array(participants));
        }
        Ok(fields)
    }
}

pub fn client(gateway: &Gateway) -> ResourceClient<'_> {
    ResourceClient::new(gateway, Module::Events)
}

pub fn create(gateway: &Gateway, event: &NewEvent) -> Result<Value, CrmError> {
    client(gateway).create(event.to_fields()?)
}

/// Events starting after `start_date` and ending before `end_date`.
pub fn list(
    gateway: &Gateway,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    limit: u32,
) -> Result<Value, CrmError> {
    let mut criteria = Criteria::new();
    if let Some(start) = start_date {
        criteria = criteria.clause(
            "Start_DateTime",
            CriteriaOperator::GreaterThan,
            start.format("%Y-%m-%d").to_string(),
        );
    }
    if let Some(end) = end_date {
        criteria = criteria.clause(
            "End_DateTime",
            CriteriaOperator::LessThan,
            end.format("%Y-%m-%d").to_string(),
        );
    }
    client(gateway).list(&ListQuery::with_limit(limit).criteria(criteria))
}

pub fn upcoming(gateway: &Gateway, days: u32, today: NaiveDate) -> Result<Value, CrmError> {
    list(
        gateway,
        Some(today),
        Some(days_after(today, days)?),
        super::DEFAULT_PAGE_SIZE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_fields_carry_start_end_and_participants() {
        let mut event = NewEvent::new("Demo", parse_start("2026-02-03 09:30").expect("start"));
        event.duration_minutes = 45;
        event.attendees = vec!["a@x.com".to_string(), "b@x.com".to_string()];
        event.related_to = Some(RelatedTo::new(Module::Contacts, "5"));
        let fields = event.to_fields().expect("fields");
        assert_eq!(fields["Start_DateTime"], json!("2026-02-03T09:30:00+00:00"));
        assert_eq!(fields["End_DateTime"], json!("2026-02-03T10:15:00+00:00"));
        assert_eq!(
            fields["Participants"],
            json!([{"email": "a@x.com"}, {"email": "b@x.com"}])
        );
        assert_eq!(fields["$se_module"], json!("Contacts"));
    }

    #[test]
    fn malformed_start_is_rejected() {
        assert!(parse_start("2026-02-03").is_err());
        assert!(parse_start("03/02/2026 09:30").is_err());
    }
}
