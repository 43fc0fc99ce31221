use super::stage::{validate_stage, Stage, DEFAULT_SUB_PIPELINE};
use super::{Pipeline, RecordFilter};
use crate::error::CrmError;
use crate::gateway::{Criteria, Gateway};
use crate::resources::{
    envelope_of, first_record, insert_opt, ListQuery, Module, ResourceClient,
};
use crate::shared::batch::{BatchItem, BatchStatus};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct NewPipeline {
    pub name: Option<String>,
    pub contact_id: Option<String>,
    pub company_id: Option<String>,
    pub stage: String,
    pub amount: f64,
    pub closing_date: Option<String>,
    pub owner: Option<String>,
    pub sub_pipeline: String,
}

impl Default for NewPipeline {
    fn default() -> Self {
        Self {
            name: None,
            contact_id: None,
            company_id: None,
            stage: Stage::Qualification.as_str().to_string(),
            amount: 0.0,
            closing_date: None,
            owner: None,
            sub_pipeline: DEFAULT_SUB_PIPELINE.to_string(),
        }
    }
}

impl NewPipeline {
    pub fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        let stage = validate_stage(&self.stage)?;
        let mut fields = Map::new();
        fields.insert("Stage".to_string(), json!(stage.as_str()));
        fields.insert("Amount".to_string(), json!(self.amount));
        fields.insert("Sub_Pipeline".to_string(), json!(self.sub_pipeline));
        insert_opt(&mut fields, "Deal_Name", self.name.clone());
        if let Some(id) = &self.contact_id {
            fields.insert("Contact_Name".to_string(), json!({ "id": id }));
        }
        if let Some(id) = &self.company_id {
            fields.insert("Account_Name".to_string(), json!({ "id": id }));
        }
        insert_opt(&mut fields, "Closing_Date", self.closing_date.clone());
        if let Some(owner) = &self.owner {
            fields.insert("Owner".to_string(), json!({ "email": owner }));
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineUpdate {
    pub stage: Option<String>,
    pub amount: Option<f64>,
    pub probability: Option<u8>,
    pub closing_date: Option<String>,
}

impl PipelineUpdate {
    fn to_fields(&self) -> Result<Map<String, Value>, CrmError> {
        let mut fields = Map::new();
        if let Some(stage) = &self.stage {
            fields.insert("Stage".to_string(), json!(validate_stage(stage)?.as_str()));
        }
        insert_opt(&mut fields, "Amount", self.amount);
        if let Some(probability) = self.probability {
            if probability > 100 {
                return Err(CrmError::InvalidArgument(format!(
                    "probability must be between 0 and 100 (got {probability})"
                )));
            }
            fields.insert("Probability".to_string(), json!(probability));
        }
        insert_opt(&mut fields, "Closing_Date", self.closing_date.clone());
        if fields.is_empty() {
            return Err(CrmError::InvalidArgument(
                "pipeline update needs at least one field".to_string(),
            ));
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Advanced {
        pipeline_id: String,
        from_stage: Option<String>,
        to_stage: String,
        result: Value,
    },
    /// No following stage; the fetched record is returned as-is.
    Unchanged { pipeline_id: String, data: Vec<Value> },
}

/// Validates and persists pipeline stage moves. Stage checks run before any
/// network call; terminal records are refused. Reads and writes are separate
/// requests, so a concurrent external change between them is not detected.
pub struct PipelineStateMachine<'a> {
    records: ResourceClient<'a>,
}

impl<'a> PipelineStateMachine<'a> {
    pub fn new(gateway: &'a Gateway) -> Self {
        Self {
            records: ResourceClient::new(gateway, Module::Pipelines),
        }
    }

    pub fn create(&self, pipeline: &NewPipeline) -> Result<Value, CrmError> {
        self.records.create(pipeline.to_fields()?)
    }

    /// Updates fields; a stage change is refused on a terminal record.
    pub fn update(&self, pipeline_id: &str, update: &PipelineUpdate) -> Result<Value, CrmError> {
        let fields = update.to_fields()?;
        if update.stage.is_some() {
            self.fetch_open(pipeline_id)?;
        }
        self.records.update(pipeline_id, fields)
    }

    pub fn get(&self, pipeline_id: &str) -> Result<Value, CrmError> {
        self.records.get(pipeline_id)
    }

    pub fn delete(&self, pipeline_id: &str) -> Result<Value, CrmError> {
        self.records.delete(pipeline_id)
    }

    pub fn list(
        &self,
        stage: Option<&str>,
        owner: Option<&str>,
        limit: u32,
    ) -> Result<Value, CrmError> {
        let mut criteria = Criteria::new();
        if let Some(stage) = stage {
            criteria = criteria.equals("Stage", validate_stage(stage)?.as_str());
        }
        if let Some(owner) = owner {
            criteria = criteria.equals("Owner", owner);
        }
        self.records
            .list(&ListQuery::with_limit(limit).fields("All").criteria(criteria))
    }

    /// Pipelines matching `query`, skipping records without an id.
    pub fn list_pipelines(&self, query: &ListQuery) -> Result<Vec<Pipeline>, CrmError> {
        Ok(self
            .records
            .list_records(query)?
            .into_iter()
            .filter_map(Pipeline::from_record)
            .collect())
    }

    pub fn search(&self, word: &str, stage: Option<&str>) -> Result<Value, CrmError> {
        let stage = stage.map(validate_stage).transpose()?;
        let found = self.records.search(word)?;
        let Some(stage) = stage else {
            return Ok(found);
        };
        let records = crate::resources::records_from_envelope(&found)
            .into_iter()
            .filter(|record| record.str_field("Stage") == Some(stage.as_str()))
            .collect();
        Ok(envelope_of(records))
    }

    /// Moves to `explicit` when given, otherwise to the next stage of the
    /// advance sequence.
    pub fn advance(
        &self,
        pipeline_id: &str,
        explicit: Option<&str>,
    ) -> Result<AdvanceOutcome, CrmError> {
        let explicit = explicit.map(validate_stage).transpose()?;
        let current = self.fetch(pipeline_id)?;
        let target = match explicit {
            Some(stage) => {
                refuse_terminal(&current)?;
                stage
            }
            None => match current.known_stage().and_then(Stage::next) {
                Some(stage) => stage,
                None => {
                    return Ok(AdvanceOutcome::Unchanged {
                        pipeline_id: current.id.clone(),
                        data: vec![current.into_record().into_value()],
                    })
                }
            },
        };
        let result = self.persist_stage(&current.id, target, Map::new())?;
        Ok(AdvanceOutcome::Advanced {
            pipeline_id: current.id,
            from_stage: current.stage,
            to_stage: target.as_str().to_string(),
            result,
        })
    }

    pub fn win(&self, pipeline_id: &str) -> Result<Value, CrmError> {
        let current = self.fetch_open(pipeline_id)?;
        self.persist_stage(&current.id, Stage::ClosedWon, Map::new())
    }

    pub fn lose(&self, pipeline_id: &str, reason: Option<&str>) -> Result<Value, CrmError> {
        let current = self.fetch_open(pipeline_id)?;
        let mut extra = Map::new();
        insert_opt(&mut extra, "Loss_Reason", reason.map(str::to_string));
        self.persist_stage(&current.id, Stage::ClosedLost, extra)
    }

    /// Moves every pipeline listed in `from` (narrowed by `filter`) to `to`.
    /// Each update is independent; a failure becomes an `error` item.
    pub fn bulk_transition(
        &self,
        from: &str,
        to: &str,
        filter: Option<&RecordFilter>,
    ) -> Result<Vec<BatchItem>, CrmError> {
        let from = validate_stage(from)?;
        let to = validate_stage(to)?;
        let candidates = self
            .list_pipelines(
                &ListQuery::default()
                    .fields("All")
                    .criteria(Criteria::new().equals("Stage", from.as_str())),
            )?
            .into_iter()
            .filter(|pipeline| filter.map_or(true, |f| f.matches(pipeline)));
        Ok(self.transition_each(candidates, to))
    }

    /// Moves each pipeline to `to`, using the listed stage for the terminal
    /// check instead of re-fetching.
    pub fn transition_each(
        &self,
        pipelines: impl IntoIterator<Item = Pipeline>,
        to: Stage,
    ) -> Vec<BatchItem> {
        pipelines
            .into_iter()
            .map(|pipeline| {
                let outcome = refuse_terminal(&pipeline)
                    .and_then(|()| self.persist_stage(&pipeline.id, to, Map::new()));
                if let Err(err) = &outcome {
                    tracing::warn!(pipeline_id = %pipeline.id, error = %err, "stage transition failed");
                }
                let item = BatchItem::from_outcome(pipeline.id.clone(), BatchStatus::Advanced, outcome)
                    .with_detail("to_stage", to.as_str());
                match pipeline.stage {
                    Some(from) => item.with_detail("from_stage", from),
                    None => item,
                }
            })
            .collect()
    }

    fn fetch(&self, pipeline_id: &str) -> Result<Pipeline, CrmError> {
        let envelope = self.records.get(pipeline_id)?;
        first_record(&envelope)
            .and_then(Pipeline::from_record)
            .ok_or_else(|| {
                CrmError::InvalidArgument(format!("pipeline `{pipeline_id}` was not found"))
            })
    }

    fn fetch_open(&self, pipeline_id: &str) -> Result<Pipeline, CrmError> {
        let pipeline = self.fetch(pipeline_id)?;
        refuse_terminal(&pipeline)?;
        Ok(pipeline)
    }

    fn persist_stage(
        &self,
        pipeline_id: &str,
        stage: Stage,
        mut extra: Map<String, Value>,
    ) -> Result<Value, CrmError> {
        extra.insert("Stage".to_string(), json!(stage.as_str()));
        tracing::debug!(pipeline_id, stage = %stage, "persisting stage");
        self.records.update(pipeline_id, extra)
    }
}

fn refuse_terminal(pipeline: &Pipeline) -> Result<(), CrmError> {
    match pipeline.known_stage() {
        Some(stage) if stage.is_terminal() => Err(CrmError::TerminalStage {
            pipeline_id: pipeline.id.clone(),
            stage: stage.as_str().to_string(),
        }),
        _ => Ok(()),
    }
}
