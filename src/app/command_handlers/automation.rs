use crate::app::cli::{AssignMode, AutomationCommand};
use crate::app::command_support::{map_crm_err, render_batch, render_json, CommandContext};
use crate::workflows::assignment::{assign_unassigned, AssignmentMode};
use crate::workflows::stale::{
    auto_advance, create_follow_up_tasks, find_stale, identify_stuck, summarize_stale,
    AdvanceCriteria,
};
use serde_json::json;

impl From<AssignMode> for AssignmentMode {
    fn from(mode: AssignMode) -> Self {
        match mode {
            AssignMode::RoundRobin => Self::RoundRobin,
            AssignMode::Random => Self::Random,
        }
    }
}

pub fn cmd_automation(command: AutomationCommand, context: &CommandContext) -> Result<String, String> {
    let gateway = context.gateway().map_err(map_crm_err)?;
    let today = context.today();
    match command {
        AutomationCommand::Assign { owners, mode } => {
            let items =
                assign_unassigned(&gateway, &owners, mode.into()).map_err(map_crm_err)?;
            render_batch(&items)
        }
        AutomationCommand::FollowUp {
            stale_days,
            create_tasks,
        } => {
            let stale = find_stale(&gateway, stale_days, today).map_err(map_crm_err)?;
            let mut output = json!({
                "stale_days": stale_days,
                "stale_count": stale.len(),
                "pipelines": summarize_stale(&stale),
            });
            if create_tasks {
                output["tasks"] = json!(create_follow_up_tasks(&gateway, &stale, today));
            }
            render_json(&output)
        }
        AutomationCommand::Advance {
            criteria,
            target_stage,
        } => {
            let criteria = AdvanceCriteria::parse(&criteria).map_err(map_crm_err)?;
            let items = auto_advance(&gateway, &criteria, target_stage.as_deref(), today)
                .map_err(map_crm_err)?;
            render_batch(&items)
        }
        AutomationCommand::Stuck { days } => {
            let stuck = identify_stuck(&gateway, days, today).map_err(map_crm_err)?;
            render_json(&json!({ "stuck_count": stuck.len(), "pipelines": stuck }))
        }
    }
}
