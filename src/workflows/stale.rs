use super::scan_query;
use crate::error::CrmError;
use crate::gateway::{Criteria, Gateway};
use crate::pipeline::{validate_stage, Pipeline, PipelineStateMachine, RecordFilter, Stage};
use crate::resources::tasks::{self, NewTask, TaskPriority};
use crate::resources::{Module, RelatedTo};
use crate::shared::batch::{BatchItem, BatchStatus};
use crate::shared::clock::days_before;
use chrono::NaiveDate;
use serde::Serialize;

pub const FOLLOW_UP_SUBJECT: &str = "Follow up on stale pipeline";
pub const DEFAULT_STALE_DAYS: u32 = 7;
pub const DEFAULT_STUCK_DAYS: u32 = 14;
pub const DEFAULT_ADVANCE_CRITERIA: &str = "proposal-sent-and-7-days";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StalePipeline {
    pub id: String,
    pub name: Option<String>,
    pub stage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StuckPipeline {
    pub pipeline_id: String,
    pub deal_name: Option<String>,
    pub stage: Option<String>,
    pub amount: Option<f64>,
    pub owner: Option<String>,
    pub last_modified: Option<String>,
    pub days_in_stage: u32,
    pub suggestion: &'static str,
}

fn cutoff(today: NaiveDate, days: u32) -> Result<NaiveDate, CrmError> {
    days_before(today, days)
}

/// Open pipelines with no activity on or after `today - stale_days`. A
/// missing or unreadable activity time counts as stale.
pub fn find_stale(
    gateway: &Gateway,
    stale_days: u32,
    today: NaiveDate,
) -> Result<Vec<Pipeline>, CrmError> {
    let cutoff = cutoff(today, stale_days)?;
    Ok(PipelineStateMachine::new(gateway)
        .list_pipelines(&scan_query())?
        .into_iter()
        .filter(|pipeline| !pipeline.is_terminal())
        .filter(|pipeline| {
            pipeline
                .last_activity_date()
                .map_or(true, |date| date < cutoff)
        })
        .collect())
}

pub fn summarize_stale(pipelines: &[Pipeline]) -> Vec<StalePipeline> {
    pipelines
        .iter()
        .map(|pipeline| StalePipeline {
            id: pipeline.id.clone(),
            name: pipeline.name.clone(),
            stage: pipeline.stage.clone(),
        })
        .collect()
}

/// One high-priority task due tomorrow per stale pipeline.
pub fn create_follow_up_tasks(
    gateway: &Gateway,
    stale: &[Pipeline],
    today: NaiveDate,
) -> Vec<BatchItem> {
    let due = today.succ_opt();
    stale
        .iter()
        .map(|pipeline| {
            let task = NewTask {
                subject: format!(
                    "{FOLLOW_UP_SUBJECT} - {}",
                    pipeline.name.as_deref().unwrap_or("Unknown")
                ),
                related_to: Some(RelatedTo::new(Module::Pipelines, pipeline.id.clone())),
                due_date: due,
                priority: TaskPriority::High,
                ..NewTask::default()
            };
            let outcome = tasks::create(gateway, &task);
            if let Err(err) = &outcome {
                tracing::warn!(pipeline_id = %pipeline.id, error = %err, "follow-up task failed");
            }
            BatchItem::from_outcome(pipeline.id.clone(), BatchStatus::Created, outcome)
        })
        .collect()
}

pub fn stage_suggestion(stage: &str) -> &'static str {
    match stage {
        "Prospecting" => "Send initial outreach email or make discovery call",
        "Qualification" => "Schedule qualification call to understand requirements",
        "Needs Analysis" => "Send questionnaire or schedule deep-dive meeting",
        "Value Proposition" => "Prepare and send customized proposal",
        "Id. Decision Makers" => "Request meeting with all stakeholders",
        "Proposal/Price Quote" => "Follow up on proposal acceptance",
        "Negotiation/Review" => "Address objections and finalize terms",
        _ => "Review and follow up",
    }
}

/// Open pipelines last modified before `today - days_in_stage`.
pub fn identify_stuck(
    gateway: &Gateway,
    days_in_stage: u32,
    today: NaiveDate,
) -> Result<Vec<StuckPipeline>, CrmError> {
    let cutoff = cutoff(today, days_in_stage)?;
    Ok(PipelineStateMachine::new(gateway)
        .list_pipelines(&scan_query())?
        .into_iter()
        .filter(|pipeline| !pipeline.is_terminal())
        .filter(|pipeline| pipeline.modified_date().is_some_and(|date| date < cutoff))
        .map(|pipeline| StuckPipeline {
            suggestion: stage_suggestion(pipeline.stage.as_deref().unwrap_or_default()),
            pipeline_id: pipeline.id,
            deal_name: pipeline.name,
            stage: pipeline.stage,
            amount: pipeline.amount,
            owner: pipeline.owner_email,
            last_modified: pipeline.modified_time,
            days_in_stage,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceCriteria {
    /// In `Proposal/Price Quote` and unmodified for the given days.
    ProposalSent { days: u32 },
    Filter(RecordFilter),
}

impl AdvanceCriteria {
    pub fn parse(raw: &str) -> Result<Self, CrmError> {
        let trimmed = raw.trim();
        if let Some(days) = trimmed
            .strip_prefix("proposal-sent-and-")
            .and_then(|rest| rest.strip_suffix("-days"))
        {
            return days
                .parse::<u32>()
                .map(|days| Self::ProposalSent { days })
                .map_err(|_| CrmError::InvalidFilter(raw.to_string()));
        }
        RecordFilter::parse(trimmed).map(Self::Filter)
    }
}

pub fn auto_advance(
    gateway: &Gateway,
    criteria: &AdvanceCriteria,
    target: Option<&str>,
    today: NaiveDate,
) -> Result<Vec<BatchItem>, CrmError> {
    let target = match target {
        Some(stage) => validate_stage(stage)?,
        None => Stage::NegotiationReview,
    };
    let machine = PipelineStateMachine::new(gateway);
    let candidates: Vec<Pipeline> = match criteria {
        AdvanceCriteria::ProposalSent { days } => {
            let cutoff = cutoff(today, *days)?;
            machine
                .list_pipelines(
                    &scan_query().criteria(
                        Criteria::new().equals("Stage", Stage::ProposalPriceQuote.as_str()),
                    ),
                )?
                .into_iter()
                .filter(|pipeline| pipeline.modified_date().is_some_and(|date| date < cutoff))
                .collect()
        }
        AdvanceCriteria::Filter(filter) => machine
            .list_pipelines(&scan_query())?
            .into_iter()
            .filter(|pipeline| !pipeline.is_terminal() && filter.matches(pipeline))
            .collect(),
    };
    tracing::info!(candidates = candidates.len(), target = %target, "auto-advance");
    Ok(machine.transition_each(candidates, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_criteria_accepts_proposal_window_and_filters() {
        assert_eq!(
            AdvanceCriteria::parse(DEFAULT_ADVANCE_CRITERIA).expect("default"),
            AdvanceCriteria::ProposalSent { days: 7 }
        );
        assert_eq!(
            AdvanceCriteria::parse("proposal-sent-and-30-days").expect("30"),
            AdvanceCriteria::ProposalSent { days: 30 }
        );
        assert!(matches!(
            AdvanceCriteria::parse("probability-gt-80").expect("filter"),
            AdvanceCriteria::Filter(_)
        ));
        assert!(matches!(
            AdvanceCriteria::parse("proposal-sent-and-soon-days"),
            Err(CrmError::InvalidFilter(_))
        ));
        assert!(matches!(
            AdvanceCriteria::parse("whenever"),
            Err(CrmError::InvalidFilter(_))
        ));
    }

    #[test]
    fn suggestions_fall_back_for_unknown_stages() {
        assert_eq!(
            stage_suggestion("Proposal/Price Quote"),
            "Follow up on proposal acceptance"
        );
        assert_eq!(stage_suggestion("Mystery"), "Review and follow up");
    }
}
