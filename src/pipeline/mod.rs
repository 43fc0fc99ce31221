//! Pipeline records and the stage state machine that guards their moves.

pub mod filter;
pub mod stage;
pub mod state_machine;

pub use filter::RecordFilter;
pub use stage::{is_terminal_name, next_stage, validate_stage, Stage, DEFAULT_SUB_PIPELINE};
pub use state_machine::{AdvanceOutcome, NewPipeline, PipelineStateMachine, PipelineUpdate};

use crate::resources::Record;
use crate::shared::clock::parse_date_prefix;
use chrono::NaiveDate;

/// Typed view over a pipeline record. Every CRM field is optional; only the
/// identifier is required.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub id: String,
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub stage: Option<String>,
    pub probability: Option<f64>,
    pub owner_email: Option<String>,
    pub owner_name: Option<String>,
    pub closing_date: Option<String>,
    pub modified_time: Option<String>,
    pub last_activity_time: Option<String>,
    record: Record,
}

impl Pipeline {
    pub fn from_record(record: Record) -> Option<Self> {
        let owned = |value: Option<&str>| value.map(str::to_string);
        Some(Self {
            id: record.id()?.to_string(),
            name: owned(record.str_field("Deal_Name")),
            amount: record.f64_field("Amount"),
            stage: owned(record.str_field("Stage")),
            probability: record.f64_field("Probability"),
            owner_email: owned(record.nested_str("Owner", "email")),
            owner_name: owned(record.nested_str("Owner", "name")),
            closing_date: owned(record.str_field("Closing_Date")),
            modified_time: owned(record.str_field("Modified_Time")),
            last_activity_time: owned(record.str_field("Last_Activity_Time")),
            record,
        })
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// Declared stage when it is one of the known stages.
    pub fn known_stage(&self) -> Option<Stage> {
        self.stage.as_deref().and_then(Stage::parse)
    }

    pub fn is_terminal(&self) -> bool {
        self.known_stage().is_some_and(Stage::is_terminal)
    }

    pub fn modified_date(&self) -> Option<NaiveDate> {
        self.modified_time.as_deref().and_then(parse_date_prefix)
    }

    pub fn last_activity_date(&self) -> Option<NaiveDate> {
        self.last_activity_time.as_deref().and_then(parse_date_prefix)
    }

    pub fn closing_month(&self) -> Option<&str> {
        self.closing_date.as_deref().and_then(|date| date.get(..7))
    }
}
