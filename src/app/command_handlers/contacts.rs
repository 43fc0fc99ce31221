use crate::app::cli::ContactCommand;
use crate::app::command_support::{map_crm_err, render_json, CommandContext};
use crate::resources::contacts::{self, ColumnMapping, ContactUpdate, ImportRow, NewContact};
use crate::resources::ListQuery;
use crate::shared::batch::BatchStatus;
use serde_json::json;

pub fn cmd_contacts(command: ContactCommand, context: &CommandContext) -> Result<String, String> {
    let gateway = context.gateway().map_err(map_crm_err)?;
    let records = contacts::client(&gateway);
    let value = match command {
        ContactCommand::Create {
            first_name,
            last_name,
            email,
            phone,
            company,
            company_id,
            source,
        } => contacts::create(
            &gateway,
            &NewContact {
                first_name,
                last_name,
                email,
                phone,
                company,
                company_id,
                source,
            },
        ),
        ContactCommand::Update {
            id,
            email,
            phone,
            company_id,
        } => contacts::update(
            &gateway,
            &id,
            &ContactUpdate {
                email,
                phone,
                company_id,
            },
        ),
        ContactCommand::Get { id } => records.get(&id),
        ContactCommand::List { limit } => records.list(&ListQuery::with_limit(limit)),
        ContactCommand::Search { query } => records.search(&query),
        ContactCommand::Delete { id } => records.delete(&id),
        ContactCommand::Import { file, mapping } => {
            let mapping = match mapping {
                Some(path) => ColumnMapping::load(&path).map_err(map_crm_err)?,
                None => ColumnMapping::default(),
            };
            let rows = contacts::import_csv_file(&gateway, &file, &mapping).map_err(map_crm_err)?;
            return render_import(&rows);
        }
    };
    render_json(&value.map_err(map_crm_err)?)
}

/// `{"created": n, "skipped": s, "failed": m, "results": [...]}`.
fn render_import(rows: &[ImportRow]) -> Result<String, String> {
    let count = |status: BatchStatus| rows.iter().filter(|row| row.status == status).count();
    render_json(&json!({
        "created": count(BatchStatus::Created),
        "skipped": count(BatchStatus::Skipped),
        "failed": count(BatchStatus::Error),
        "results": rows,
    }))
}
