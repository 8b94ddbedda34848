use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedTotal {
    pub page_counts: Vec<usize>,
    pub total: usize,
}

impl PagedTotal {
    pub fn record_page(&mut self, count: usize) -> usize {
        self.page_counts.push(count);
        self.total += count;
        self.total
    }

    pub fn pages(&self) -> usize {
        self.page_counts.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub section: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: String,
    pub tool_version: String,
    pub generated_at: String,
    pub output_file: String,
    pub standard_id: String,
    pub checks: Vec<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_issues: Option<PagedTotal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_high: Option<PagedTotal>,
}
