use super::{envelope_of, insert_opt, ListQuery, RelatedTo, ResourceClient};
use crate::error::CrmError;
use crate::gateway::{Criteria, CriteriaOperator, Gateway};
use crate::resources::Module;
use crate::shared::clock::{days_after, parse_date_prefix};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const OPEN_STATUS: &str = "Open";
pub const COMPLETED_STATUS: &str = "Completed";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Normal => "Normal",
            Self::Low => "Low",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CrmError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            _ => Err(CrmError::InvalidArgument(format!(
                "task priority must be one of: High, Normal, Low (got `{raw}`)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub subject: String,
    pub related_to: Option<RelatedTo>,
    pub due_date: Option<NaiveDate>,
    pub priority: TaskPriority,
    pub owner: Option<String>,
    pub description: Option<String>,
}

impl NewTask {
    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        if self.subject.trim().is_empty() {
            return Err(CrmError::InvalidArgument(
                "task subject must be non-empty".to_string(),
            ));
        }
        let mut fields = Map::new();
        fields.insert("Subject".to_string(), json!(self.subject));
        fields.insert("Priority".to_string(), json!(self.priority.as_str()));
        fields.insert("Status".to_string(), json!(OPEN_STATUS));
        insert_opt(
            &mut fields,
            "Due_Date",
            self.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
        );
        if let Some(owner) = &self.owner {
            fields.insert("Owner".to_string(), json!({ "email": owner }));
        }
        insert_opt(&mut fields, "Description", self.description.clone());
        if let Some(related) = &self.related_to {
            related.apply_to(&mut fields);
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub subject: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
}

impl TaskUpdate {
    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        let mut fields = Map::new();
        insert_opt(&mut fields, "Subject", self.subject.clone());
        insert_opt(
            &mut fields,
            "Due_Date",
            self.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
        );
        insert_opt(&mut fields, "Priority", self.priority.map(TaskPriority::as_str));
        if fields.is_empty() {
            return Err(CrmError::InvalidArgument(
                "task update needs at least one field".to_string(),
            ));
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub status: String,
    pub due_before: Option<NaiveDate>,
    pub due_after: Option<NaiveDate>,
    pub owner: Option<String>,
    pub limit: u32,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            status: OPEN_STATUS.to_string(),
            due_before: None,
            due_after: None,
            owner: None,
            limit: super::DEFAULT_PAGE_SIZE,
        }
    }
}

pub fn client(gateway: &Gateway) -> ResourceClient<'_> {
    ResourceClient::new(gateway, Module::Tasks)
}

pub fn create(gateway: &Gateway, task: &NewTask) -> Result<Value, CrmError> {
    client(gateway).create(task.to_fields()?)
}

pub fn update(gateway: &Gateway, task_id: &str, update: &TaskUpdate) -> Result<Value, CrmError> {
    client(gateway).update(task_id, update.to_fields()?)
}

pub fn complete(gateway: &Gateway, task_id: &str) -> Result<Value, CrmError> {
    let mut fields = Map::new();
    fields.insert("Status".to_string(), json!(COMPLETED_STATUS));
    client(gateway).update(task_id, fields)
}

/// Server-side filter on status and due-before, then client-side filters on
/// due-after and owner. Records without the filtered field are excluded.
pub fn list(gateway: &Gateway, query: &TaskQuery) -> Result<Value, CrmError> {
    let mut criteria = Criteria::new().equals("Status", query.status.clone());
    if let Some(before) = query.due_before {
        criteria = criteria.clause(
            "Due_Date",
            CriteriaOperator::LessThan,
            before.format(DATE_FORMAT).to_string(),
        );
    }
    let records = client(gateway)
        .list_records(&ListQuery::with_limit(query.limit).criteria(criteria))?
        .into_iter()
        .filter(|record| match query.due_after {
            Some(after) => record
                .str_field("Due_Date")
                .and_then(parse_date_prefix)
                .is_some_and(|due| due >= after),
            None => true,
        })
        .filter(|record| match &query.owner {
            Some(owner) => record.nested_str("Owner", "email") == Some(owner.as_str()),
            None => true,
        })
        .collect();
    Ok(envelope_of(records))
}

pub fn upcoming(
    gateway: &Gateway,
    days: u32,
    status: &str,
    today: NaiveDate,
) -> Result<Value, CrmError> {
    list(
        gateway,
        &TaskQuery {
            status: status.to_string(),
            due_before: Some(days_after(today, days)?),
            due_after: Some(today),
            ..TaskQuery::default()
        },
    )
}

/// Open tasks due before today.
pub fn overdue(gateway: &Gateway, owner: Option<&str>, today: NaiveDate) -> Result<Value, CrmError> {
    list(
        gateway,
        &TaskQuery {
            due_before: Some(today),
            owner: owner.map(str::to_string),
            ..TaskQuery::default()
        },
    )
}

pub fn follow_up(
    gateway: &Gateway,
    related_to: RelatedTo,
    subject: &str,
    days: u32,
    priority: TaskPriority,
    today: NaiveDate,
) -> Result<Value, CrmError> {
    create(
        gateway,
        &NewTask {
            subject: subject.to_string(),
            related_to: Some(related_to),
            due_date: Some(days_after(today, days)?),
            priority,
            ..NewTask::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_fields_include_relation_and_due_date() {
        let task = NewTask {
            subject: "Call back".to_string(),
            related_to: Some(RelatedTo::new(Module::Pipelines, "77")),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 4),
            priority: TaskPriority::High,
            owner: Some("a@x.com".to_string()),
            description: None,
        };
        let fields = task.to_fields().expect("fields");
        assert_eq!(fields["Subject"], json!("Call back"));
        assert_eq!(fields["Priority"], json!("High"));
        assert_eq!(fields["Status"], json!("Open"));
        assert_eq!(fields["Due_Date"], json!("2026-03-04"));
        assert_eq!(fields["Owner"], json!({"email": "a@x.com"}));
        assert_eq!(fields["What_Id"], json!({"id": "77"}));
        assert_eq!(fields["$se_module"], json!("Pipelines"));
        assert!(!fields.contains_key("Description"));
    }

    #[test]
    fn priority_parse_is_case_insensitive() {
        assert_eq!(TaskPriority::parse("HIGH").expect("high"), TaskPriority::High);
        assert!(TaskPriority::parse("urgent").is_err());
    }
}
