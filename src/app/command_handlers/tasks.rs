use crate::app::cli::TaskCommand;
use crate::app::command_support::{
    map_crm_err, parse_optional_date, parse_related, render_json, CommandContext,
};
use crate::resources::tasks::{self, NewTask, TaskPriority, TaskQuery, TaskUpdate};
use crate::resources::RelatedTo;

pub fn cmd_tasks(command: TaskCommand, context: &CommandContext) -> Result<String, String> {
    let gateway = context.gateway().map_err(map_crm_err)?;
    let today = context.today();
    let value = match command {
        TaskCommand::Create {
            subject,
            related_to,
            due,
            priority,
            owner,
            description,
        } => {
            let task = NewTask {
                subject,
                related_to: parse_related(related_to.as_deref())?,
                due_date: parse_optional_date("due", due.as_deref())?,
                priority: TaskPriority::parse(&priority).map_err(map_crm_err)?,
                owner,
                description,
            };
            tasks::create(&gateway, &task)
        }
        TaskCommand::Update {
            id,
            subject,
            due,
            priority,
        } => {
            let update = TaskUpdate {
                subject,
                due_date: parse_optional_date("due", due.as_deref())?,
                priority: priority
                    .as_deref()
                    .map(TaskPriority::parse)
                    .transpose()
                    .map_err(map_crm_err)?,
            };
            tasks::update(&gateway, &id, &update)
        }
        TaskCommand::Complete { id } => tasks::complete(&gateway, &id),
        TaskCommand::Get { id } => tasks::client(&gateway).get(&id),
        TaskCommand::List {
            status,
            due_before,
            due_after,
            owner,
            limit,
        } => {
            let query = TaskQuery {
                status,
                due_before: parse_optional_date("due-before", due_before.as_deref())?,
                due_after: parse_optional_date("due-after", due_after.as_deref())?,
                owner,
                limit,
            };
            tasks::list(&gateway, &query)
        }
        TaskCommand::Upcoming { days, status } => tasks::upcoming(&gateway, days, &status, today),
        TaskCommand::Overdue { owner } => tasks::overdue(&gateway, owner.as_deref(), today),
        TaskCommand::Delete { id } => tasks::client(&gateway).delete(&id),
        TaskCommand::FollowUp {
            related_to,
            subject,
            days,
            priority,
        } => {
            let related = RelatedTo::parse(&related_to).map_err(map_crm_err)?;
            let priority = TaskPriority::parse(&priority).map_err(map_crm_err)?;
            tasks::follow_up(&gateway, related, &subject, days, priority, today)
        }
    };
    render_json(&value.map_err(map_crm_err)?)
}

