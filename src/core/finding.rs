#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finding {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity_label: String,
    pub workflow_status: String,
    pub account_id: String,
    pub created_at: String,
    pub last_observed_at: String,
    pub product_arn: String,
    pub associated_standards: Vec<String>,
    pub resource_ids: Vec<String>,
}

impl Finding {
    pub fn is_associated_with(&self, standard_id: &str) -> bool {
        self.associated_standards.iter().any(|s| s == standard_id)
    }

    pub fn first_resource_id(&self) -> &str {
        self.resource_ids.first().map(String::as_str).unwrap_or("")
    }

    /// Description collapsed onto a single line.
    pub fn flat_description(&self) -> String {
        self.description.replace(['\r', '\n'], " ").trim().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub findings: Vec<Finding>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardSubscription {
    pub standards_arn: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorDetail {
    pub arn: String,
    pub aggregation_region: String,
    pub region_linking_mode: String,
    pub regions: Vec<String>,
}
