use crate::app::cli::{CallCommand, ContactCall};
use crate::app::command_support::{map_crm_err, parse_related, render_json, CommandContext};
use crate::error::CrmError;
use crate::gateway::Gateway;
use crate::resources::calls::{self, CallType, NewCall};
use serde_json::Value;

pub fn cmd_calls(command: CallCommand, context: &CommandContext) -> Result<String, String> {
    let gateway = context.gateway().map_err(map_crm_err)?;
    let value = match command {
        CallCommand::Create {
            subject,
            related_to,
            call_type,
            duration,
            outcome,
            description,
            owner,
        } => {
            let call = NewCall {
                subject,
                related_to: parse_related(related_to.as_deref())?,
                call_type: CallType::parse(&call_type).map_err(map_crm_err)?,
                duration_minutes: duration,
                outcome,
                description,
                owner,
            };
            calls::create(&gateway, &call)
        }
        CallCommand::List {
            related_to,
            call_type,
            limit,
        } => {
            let related = parse_related(related_to.as_deref())?;
            let call_type = call_type
                .as_deref()
                .map(CallType::parse)
                .transpose()
                .map_err(map_crm_err)?;
            calls::list(&gateway, related.as_ref(), call_type, limit)
        }
        CallCommand::Outbound(call) => log_call(&gateway, CallType::Outbound, call),
        CallCommand::Inbound(call) => log_call(&gateway, CallType::Inbound, call),
    };
    render_json(&value.map_err(map_crm_err)?)
}

fn log_call(gateway: &Gateway, call_type: CallType, call: ContactCall) -> Result<Value, CrmError> {
    calls::log_for_contact(
        gateway,
        &call.contact_id,
        call_type,
        &call.subject,
        call.duration,
        call.outcome,
    )
}
