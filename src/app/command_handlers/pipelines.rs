use crate::app::cli::PipelineCommand;
use crate::app::command_support::{map_crm_err, render_batch, render_json, CommandContext};
use crate::pipeline::{NewPipeline, PipelineStateMachine, PipelineUpdate, RecordFilter};

pub fn cmd_pipelines(command: PipelineCommand, context: &CommandContext) -> Result<String, String> {
    let gateway = context.gateway().map_err(map_crm_err)?;
    let machine = PipelineStateMachine::new(&gateway);
    let value = match command {
        PipelineCommand::Create {
            contact_id,
            company_id,
            name,
            stage,
            amount,
            closing_date,
            owner,
            sub_pipeline,
        } => {
            let mut pipeline = NewPipeline {
                name,
                contact_id,
                company_id,
                stage,
                amount,
                closing_date,
                owner,
                ..NewPipeline::default()
            };
            if let Some(sub_pipeline) = sub_pipeline {
                pipeline.sub_pipeline = sub_pipeline;
            }
            machine.create(&pipeline)
        }
        PipelineCommand::Update {
            id,
            stage,
            amount,
            probability,
            closing_date,
        } => machine.update(
            &id,
            &PipelineUpdate {
                stage,
                amount,
                probability,
                closing_date,
            },
        ),
        PipelineCommand::Get { id } => machine.get(&id),
        PipelineCommand::List {
            stage,
            owner,
            limit,
        } => machine.list(stage.as_deref(), owner.as_deref(), limit),
        PipelineCommand::Search { query, stage } => machine.search(&query, stage.as_deref()),
        PipelineCommand::Delete { id } => machine.delete(&id),
        PipelineCommand::Advance { id, stage } => {
            let outcome = machine.advance(&id, stage.as_deref()).map_err(map_crm_err)?;
            return render_json(&outcome);
        }
        PipelineCommand::Win { id } => machine.win(&id),
        PipelineCommand::Lose { id, reason } => machine.lose(&id, reason.as_deref()),
        PipelineCommand::BulkUpdate {
            stage,
            new_stage,
            criteria,
        } => {
            let filter = criteria
                .as_deref()
                .map(RecordFilter::parse)
                .transpose()
                .map_err(map_crm_err)?;
            let items = machine
                .bulk_transition(&stage, &new_stage, filter.as_ref())
                .map_err(map_crm_err)?;
            return render_batch(&items);
        }
    };
    render_json(&value.map_err(map_crm_err)?)
}
