use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Created,
    Advanced,
    Skipped,
    Error,
}

/// Outcome of one sub-operation inside a batch workflow. A failing item is
/// recorded with `status: error` and never aborts the rest of the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub pipeline_id: String,
    pub status: BatchStatus,
    #[serde(flatten)]
    pub details: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn new(pipeline_id: impl Into<String>, status: BatchStatus) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            status,
            details: Map::new(),
            result: None,
            error: None,
        }
    }

    pub fn from_outcome<E: std::fmt::Display>(
        pipeline_id: impl Into<String>,
        ok_status: BatchStatus,
        outcome: Result<Value, E>,
    ) -> Self {
        match outcome {
            Ok(value) => Self::new(pipeline_id, ok_status).with_result(value),
            Err(err) => Self::new(pipeline_id, BatchStatus::Error).with_error(err.to_string()),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == BatchStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_item_serializes_details_inline() {
        let item = BatchItem::new("42", BatchStatus::Success)
            .with_detail("assigned_to", "a@x.com")
            .with_result(json!({"data": []}));
        let value = serde_json::to_value(&item).expect("serialize");
        assert_eq!(
            value,
            json!({
                "pipeline_id": "42",
                "status": "success",
                "assigned_to": "a@x.com",
                "result": {"data": []}
            })
        );
    }

    #[test]
    fn failed_outcome_records_error_text() {
        let item = BatchItem::from_outcome::<String>(
            "7",
            BatchStatus::Advanced,
            Err("boom".to_string()),
        );
        assert!(item.is_error());
        assert_eq!(item.error.as_deref(), Some("boom"));
        assert!(item.result.is_none());
    }
}
