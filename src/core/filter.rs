use std::collections::BTreeMap;

use crate::core::Finding;

pub const FSBP_STANDARD_ID: &str = "standards/aws-foundational-security-best-practices/v/1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equals,
    NotEquals,
    Prefix,
    PrefixNotEquals,
    Contains,
    NotContains,
}

impl Comparison {
    pub const fn as_str(self) -> &'static str {
        match self {
            Comparison::Equals => "EQUALS",
            Comparison::NotEquals => "NOT_EQUALS",
            Comparison::Prefix => "PREFIX",
            Comparison::PrefixNotEquals => "PREFIX_NOT_EQUALS",
            Comparison::Contains => "CONTAINS",
            Comparison::NotContains => "NOT_CONTAINS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringCondition {
    pub value: String,
    pub comparison: Comparison,
}

/// Server-side filter: field name to the conditions on that field. Multiple
/// conditions on one field are OR-ed by the API, separate fields AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindingFilter {
    fields: BTreeMap<String, Vec<StringCondition>>,
}

impl FindingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(self, field: &str, value: &str) -> Self {
        self.with(field, value, Comparison::Equals)
    }

    pub fn with(mut self, field: &str, value: &str, comparison: Comparison) -> Self {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(StringCondition {
                value: value.to_string(),
                comparison,
            });
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[StringCondition])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn conditions(&self, field: &str) -> &[StringCondition] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// RecordState=ACTIVE, WorkflowStatus=NEW.
    pub fn active_new() -> Self {
        Self::new()
            .equals("RecordState", "ACTIVE")
            .equals("WorkflowStatus", "NEW")
    }

    pub fn active_new_critical_high() -> Self {
        Self::active_new()
            .equals("SeverityLabel", "CRITICAL")
            .equals("SeverityLabel", "HIGH")
    }
}

/// Keeps the findings associated with `standard_id`. The findings API has no
/// filter field for this, so it runs per page after the fetch.
pub fn retain_standard(findings: Vec<Finding>, standard_id: &str) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|f| f.is_associated_with(standard_id))
        .collect()
}
