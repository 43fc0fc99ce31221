use crate::app::cli::ReportCommand;
use crate::app::command_support::{map_crm_err, render_json, CommandContext};
use crate::workflows::reports::{self, ActivitySections, CsvReport};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

pub fn cmd_reports(command: ReportCommand, context: &CommandContext) -> Result<String, String> {
    let gateway = context.gateway().map_err(map_crm_err)?;
    let now = context.clock.now();
    match command {
        ReportCommand::Pipeline {
            by_stage,
            by_owner,
            output,
        } => emit(
            reports::pipeline_report(&gateway, by_stage, by_owner, now).map_err(map_crm_err)?,
            output,
        ),
        ReportCommand::Forecast { month, output } => emit(
            reports::forecast(&gateway, month.as_deref(), now).map_err(map_crm_err)?,
            output,
        ),
        ReportCommand::Performance {
            owner,
            month,
            output,
        } => emit(
            reports::performance(&gateway, owner.as_deref(), month.as_deref(), now)
                .map_err(map_crm_err)?,
            output,
        ),
        ReportCommand::Activity {
            user,
            week,
            include_calls,
            include_tasks,
            include_events,
        } => {
            let sections = ActivitySections {
                calls: include_calls,
                tasks: include_tasks,
                events: include_events,
            };
            render_json(
                &reports::activity(&gateway, &user, week.as_deref(), sections, now)
                    .map_err(map_crm_err)?,
            )
        }
    }
}

/// Prints the report, or exports it as CSV when `--output` is given.
fn emit<R: Serialize + CsvReport>(report: R, output: Option<PathBuf>) -> Result<String, String> {
    let Some(path) = output else {
        return render_json(&report);
    };
    let rows = reports::export_csv(&report, &path).map_err(map_crm_err)?;
    render_json(&json!({
        "status": "exported",
        "path": path.display().to_string(),
        "rows": rows,
    }))
}
