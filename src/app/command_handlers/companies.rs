use crate::app::cli::{CompanyCommand, CompanyFields};
use crate::app::command_support::{map_crm_err, render_json, CommandContext};
use crate::resources::companies::{self, CompanyUpdate, NewCompany};
use crate::resources::ListQuery;

impl From<CompanyFields> for NewCompany {
    fn from(fields: CompanyFields) -> Self {
        Self {
            name: fields.name,
            industry: fields.industry,
            website: fields.website,
            employees: fields.employees,
            address: fields.address,
            phone: fields.phone,
        }
    }
}

pub fn cmd_companies(command: CompanyCommand, context: &CommandContext) -> Result<String, String> {
    let gateway = context.gateway().map_err(map_crm_err)?;
    let records = companies::client(&gateway);
    let value = match command {
        CompanyCommand::Create(fields) => companies::create(&gateway, &fields.into()),
        CompanyCommand::Update {
            id,
            phone,
            website,
            industry,
        } => companies::update(
            &gateway,
            &id,
            &CompanyUpdate {
                phone,
                website,
                industry,
            },
        ),
        CompanyCommand::Get {
            id,
            include_contacts,
        } => companies::get_with_contacts(&gateway, &id, include_contacts),
        CompanyCommand::List { limit } => records.list(&ListQuery::with_limit(limit)),
        CompanyCommand::Search { query } => records.search(&query),
        CompanyCommand::Delete { id } => records.delete(&id),
        CompanyCommand::FindOrCreate(fields) => companies::find_or_create(&gateway, &fields.into()),
    };
    render_json(&value.map_err(map_crm_err)?)
}
