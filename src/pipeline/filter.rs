//! Record predicates for bulk and automated stage moves, written as
//! `<field>-<comparison>-<number>`, e.g. `probability-gt-80`.

use super::Pipeline;
use crate::error::CrmError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Probability,
    Amount,
}

impl FilterField {
    fn as_str(self) -> &'static str {
        match self {
            Self::Probability => "probability",
            Self::Amount => "amount",
        }
    }

    fn value_of(self, pipeline: &Pipeline) -> Option<f64> {
        match self {
            Self::Probability => pipeline.probability,
            Self::Amount => pipeline.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl Comparison {
    fn as_str(self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Eq => "eq",
        }
    }

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => (left - right).abs() < f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordFilter {
    pub field: FilterField,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl RecordFilter {
    pub fn parse(raw: &str) -> Result<Self, CrmError> {
        let invalid = || CrmError::InvalidFilter(raw.to_string());
        let mut parts = raw.trim().splitn(3, '-');
        let field = match parts.next() {
            Some("probability") => FilterField::Probability,
            Some("amount") => FilterField::Amount,
            _ => return Err(invalid()),
        };
        let comparison = match parts.next() {
            Some("gt") => Comparison::Gt,
            Some("ge") => Comparison::Ge,
            Some("lt") => Comparison::Lt,
            Some("le") => Comparison::Le,
            Some("eq") => Comparison::Eq,
            _ => return Err(invalid()),
        };
        let threshold = parts
            .next()
            .and_then(|n| n.parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .ok_or_else(invalid)?;
        Ok(Self {
            field,
            comparison,
            threshold,
        })
    }

    /// A pipeline without the filtered field never matches.
    pub fn matches(&self, pipeline: &Pipeline) -> bool {
        self.field
            .value_of(pipeline)
            .is_some_and(|value| self.comparison.holds(value, self.threshold))
    }
}

impl FromStr for RecordFilter {
    type Err = CrmError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.field.as_str(),
            self.comparison.as_str(),
            self.threshold
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Record;
    use serde_json::json;

    fn pipeline(fields: serde_json::Value) -> Pipeline {
        Pipeline::from_record(Record::from_value(fields).expect("object")).expect("id")
    }

    #[test]
    fn parses_field_comparison_and_threshold() {
        let filter = RecordFilter::parse("probability-gt-80").expect("parse");
        assert_eq!(filter.field, FilterField::Probability);
        assert_eq!(filter.comparison, Comparison::Gt);
        assert_eq!(filter.threshold, 80.0);
        assert_eq!(filter.to_string(), "probability-gt-80");

        let filter: RecordFilter = "amount-le-2500.5".parse().expect("parse");
        assert_eq!(filter.field, FilterField::Amount);
        assert_eq!(filter.threshold, 2500.5);
    }

    #[test]
    fn unknown_shapes_are_invalid_filters() {
        for raw in ["", "probability", "probability-gt", "stage-eq-1", "amount-ne-5", "amount-gt-lots"] {
            let err = RecordFilter::parse(raw).expect_err("invalid");
            assert!(matches!(err, CrmError::InvalidFilter(_)), "{raw}");
        }
    }

    #[test]
    fn absent_field_never_matches() {
        let filter = RecordFilter::parse("probability-lt-50").expect("parse");
        assert!(!filter.matches(&pipeline(json!({"id": "1"}))));
        assert!(filter.matches(&pipeline(json!({"id": "1", "Probability": 20}))));
        assert!(!filter.matches(&pipeline(json!({"id": "1", "Probability": 90}))));
    }
}
