use super::{insert_opt, records_from_envelope, ListQuery, ResourceClient};
use crate::error::CrmError;
use crate::gateway::{Criteria, Gateway};
use crate::resources::Module;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCompany {
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub employees: Option<u32>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl NewCompany {
    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        if self.name.trim().is_empty() {
            return Err(CrmError::InvalidArgument(
                "company name must be non-empty".to_string(),
            ));
        }
        let mut fields = Map::new();
        fields.insert("Account_Name".to_string(), json!(self.name.trim()));
        insert_opt(&mut fields, "Industry", self.industry.clone());
        insert_opt(&mut fields, "Website", self.website.clone());
        insert_opt(&mut fields, "Employees", self.employees);
        insert_opt(&mut fields, "Billing_Street", self.address.clone());
        insert_opt(&mut fields, "Phone", self.phone.clone());
        Ok(fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyUpdate {
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
}

impl CompanyUpdate {
    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        let mut fields = Map::new();
        insert_opt(&mut fields, "Phone", self.phone.clone());
        insert_opt(&mut fields, "Website", self.website.clone());
        insert_opt(&mut fields, "Industry", self.industry.clone());
        if fields.is_empty() {
            return Err(CrmError::InvalidArgument(
                "company update needs at least one field".to_string(),
            ));
        }
        Ok(fields)
    }
}

pub fn client(gateway: &Gateway) -> ResourceClient<'_> {
    ResourceClient::new(gateway, Module::Accounts)
}

pub fn create(gateway: &Gateway, company: &NewCompany) -> Result<Value, CrmError> {
    client(gateway).create(company.to_fields()?)
}

pub fn update(gateway: &Gateway, company_id: &str, update: &CompanyUpdate) -> Result<Value, CrmError> {
    client(gateway).update(company_id, update.to_fields()?)
}

/// The company envelope, with its contacts under `contacts` when requested.
pub fn get_with_contacts(
    gateway: &Gateway,
    company_id: &str,
    include_contacts: bool,
) -> Result<Value, CrmError> {
    let mut company = client(gateway).get(company_id)?;
    if include_contacts {
        let contacts = ResourceClient::new(gateway, Module::Contacts).list(
            &ListQuery::default().criteria(Criteria::new().equals("Account_Name", company_id)),
        )?;
        let contacts = contacts.get("data").cloned().unwrap_or_else(|| json!([]));
        if let Value::Object(map) = &mut company {
            map.insert("contacts".to_string(), contacts);
        }
    }
    Ok(company)
}

/// Returns the first search hit whose name matches case-insensitively, or
/// creates the company.
pub fn find_or_create(gateway: &Gateway, company: &NewCompany) -> Result<Value, CrmError> {
    let fields = company.to_fields()?;
    let wanted = company.name.trim().to_lowercase();
    let hits = records_from_envelope(&client(gateway).search(&company.name)?);
    if let Some(existing) = hits.into_iter().find(|record| {
        record
            .str_field("Account_Name")
            .is_some_and(|name| name.to_lowercase() == wanted)
    }) {
        return Ok(json!({ "found": true, "data": [existing.into_value()] }));
    }
    let created = client(gateway).create(fields)?;
    Ok(json!({ "found": false, "data": created.get("data").cloned().unwrap_or_else(|| json!([])) }))
}
