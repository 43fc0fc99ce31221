//! Typed builder for the list-endpoint `criteria` filter expression.
//!
//! A criteria string is a sequence of `(<Field>:<operator>:<value>)` clauses
//! joined with ` and `. Values are escaped so that parentheses inside a value
//! cannot terminate the clause early.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaOperator {
    Equals,
    NotEqual,
    StartsWith,
    In,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Between,
}

impl CriteriaOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEqual => "not_equal",
            Self::StartsWith => "starts_with",
            Self::In => "in",
            Self::GreaterThan => "greater_than",
            Self::GreaterEqual => "greater_equal",
            Self::LessThan => "less_than",
            Self::LessEqual => "less_equal",
            Self::Between => "between",
        }
    }
}

/// Matches a null field in criteria expressions.
pub const EMPTY_VALUE: &str = "${EMPTY}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: String,
    pub operator: CriteriaOperator,
    pub value: String,
}

impl Clause {
    fn to_wire(&self) -> String {
        format!(
            "({}:{}:{})",
            self.field,
            self.operator.as_str(),
            escape_value(&self.value)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    clauses: Vec<Clause>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clause(
        mut self,
        field: &str,
        operator: CriteriaOperator,
        value: impl Into<String>,
    ) -> Self {
        self.clauses.push(Clause {
            field: field.to_string(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn equals(self, field: &str, value: impl Into<String>) -> Self {
        self.clause(field, CriteriaOperator::Equals, value)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// `None` when no clause was added, so callers can omit the parameter.
    pub fn to_wire(&self) -> Option<String> {
        if self.clauses.is_empty() {
            return None;
        }
        Some(
            self.clauses
                .iter()
                .map(Clause::to_wire)
                .collect::<Vec<_>>()
                .join(" and "),
        )
    }
}

fn escape_value(value: &str) -> String {
    if value == EMPTY_VALUE {
        return value.to_string();
    }
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '(' | ')' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_criteria_serializes_to_none() {
        assert_eq!(Criteria::new().to_wire(), None);
        assert!(Criteria::new().is_empty());
    }

    #[test]
    fn clauses_are_joined_with_and() {
        let criteria = Criteria::new()
            .equals("Stage", "Proposal/Price Quote")
            .equals("Owner", "a@x.com");
        assert_eq!(
            criteria.to_wire().as_deref(),
            Some("(Stage:equals:Proposal/Price Quote) and (Owner:equals:a@x.com)")
        );
    }

    #[test]
    fn operators_use_wire_names() {
        let criteria = Criteria::new()
            .clause("Due_Date", CriteriaOperator::LessThan, "2026-03-01")
            .clause("Start_DateTime", CriteriaOperator::GreaterThan, "2026-02-01");
        assert_eq!(
            criteria.to_wire().as_deref(),
            Some("(Due_Date:less_than:2026-03-01) and (Start_DateTime:greater_than:2026-02-01)")
        );
    }

    #[test]
    fn parentheses_in_values_are_escaped() {
        let criteria = Criteria::new().equals("Deal_Name", "Acme (EU) \\ renewal");
        assert_eq!(
            criteria.to_wire().as_deref(),
            Some("(Deal_Name:equals:Acme \\(EU\\) \\\\ renewal)")
        );
    }

    #[test]
    fn empty_marker_is_not_escaped() {
        let criteria = Criteria::new().equals("Owner", EMPTY_VALUE);
        assert_eq!(
            criteria.to_wire().as_deref(),
            Some("(Owner:equals:${EMPTY})")
        );
    }
}
