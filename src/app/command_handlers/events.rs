use crate::app::cli::EventCommand;
use crate::app::command_support::{
    map_crm_err, parse_optional_date, parse_related, render_json, CommandContext,
};
use crate::resources::events::{self, parse_start, NewEvent};

pub fn cmd_events(command: EventCommand, context: &CommandContext) -> Result<String, String> {
    let gateway = context.gateway().map_err(map_crm_err)?;
    let value = match command {
        EventCommand::Create {
            title,
            start,
            duration,
            related_to,
            location,
            description,
            attendees,
        } => {
            let mut event = NewEvent::new(title, parse_start(&start).map_err(map_crm_err)?);
            event.duration_minutes = duration;
            event.related_to = parse_related(related_to.as_deref())?;
            event.location = location;
            event.description = description;
            event.attendees = attendees
                .into_iter()
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty())
                .collect();
            events::create(&gateway, &event)
        }
        EventCommand::List {
            start_date,
            end_date,
            limit,
        } => events::list(
            &gateway,
            parse_optional_date("start-date", start_date.as_deref())?,
            parse_optional_date("end-date", end_date.as_deref())?,
            limit,
        ),
        EventCommand::Upcoming { days } => events::upcoming(&gateway, days, context.today()),
    };
    render_json(&value.map_err(map_crm_err)?)
}
