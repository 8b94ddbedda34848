use anyhow::{Result, anyhow, bail};
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_sdk_securityhub::Client;
use aws_sdk_securityhub::config::Region;
use aws_sdk_securityhub::error::DisplayErrorContext;
use aws_sdk_securityhub::types::{
    AwsSecurityFinding, AwsSecurityFindingFilters, StringFilter, StringFilterComparison,
};

use crate::core::{AggregatorDetail, Finding, FindingFilter, Page, StandardSubscription};
use crate::hub::SecurityHubApi;

#[derive(Debug, Clone)]
pub struct SdkOptions {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub max_attempts: u32,
}

/// Security Hub client built once per process; retry policy lives here and
/// applies to every call made through it.
#[derive(Clone)]
pub struct SdkHub {
    client: Client,
}

impl SdkHub {
    pub async fn connect(opts: &SdkOptions) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::adaptive().with_max_attempts(opts.max_attempts));
        if let Some(region) = &opts.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &opts.profile {
            loader = loader.profile_name(profile);
        }
        let shared = loader.load().await;
        let hub = Self {
            client: Client::new(&shared),
        };
        tracing::debug!(region = ?hub.region(), max_attempts = opts.max_attempts, "security hub client ready");
        hub
    }

    pub fn region(&self) -> Option<String> {
        self.client.config().region().map(|r| r.to_string())
    }
}

impl SecurityHubApi for SdkHub {
    async fn get_findings(
        &self,
        filter: &FindingFilter,
        page_size: i32,
        next_token: Option<&str>,
    ) -> Result<Page> {
        let filters = to_sdk_filters(filter)?;
        let out = self
            .client
            .get_findings()
            .filters(filters)
            .max_results(page_size)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|err| api_error("GetFindings", err))?;

        Ok(Page {
            findings: out.findings().iter().map(finding_from_sdk).collect(),
            next_token: out.next_token().map(str::to_string),
        })
    }

    async fn enabled_standards(&self) -> Result<Vec<StandardSubscription>> {
        let mut subscriptions = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .client
                .get_enabled_standards()
                .set_next_token(token.take())
                .send()
                .await
                .map_err(|err| api_error("GetEnabledStandards", err))?;

            subscriptions.extend(out.standards_subscriptions().iter().map(|s| {
                StandardSubscription {
                    standards_arn: s.standards_arn().or_empty(),
                    status: s.standards_status().or_empty(),
                }
            }));

            match out.next_token() {
                Some(next) if !next.is_empty() => token = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(subscriptions)
    }

    async fn finding_aggregator_arns(&self) -> Result<Vec<String>> {
        let out = self
            .client
            .list_finding_aggregators()
            .send()
            .await
            .map_err(|err| api_error("ListFindingAggregators", err))?;

        Ok(out
            .finding_aggregators()
            .iter()
            .map(|a| a.finding_aggregator_arn().or_empty())
            .filter(|arn| !arn.is_empty())
            .collect())
    }

    async fn finding_aggregator(&self, arn: &str) -> Result<AggregatorDetail> {
        let out = self
            .client
            .get_finding_aggregator()
            .finding_aggregator_arn(arn)
            .send()
            .await
            .map_err(|err| api_error("GetFindingAggregator", err))?;

        Ok(AggregatorDetail {
            arn: out.finding_aggregator_arn().or_empty(),
            aggregation_region: out.finding_aggregation_region().or_empty(),
            region_linking_mode: out.region_linking_mode().or_empty(),
            regions: out.regions().iter().map(|r| r.to_string()).collect(),
        })
    }
}

fn api_error<E: std::error::Error>(operation: &str, err: E) -> anyhow::Error {
    anyhow!("{operation} failed: {}", DisplayErrorContext(err))
}

pub fn to_sdk_filters(filter: &FindingFilter) -> Result<AwsSecurityFindingFilters> {
    let mut builder = AwsSecurityFindingFilters::builder();
    for (field, conditions) in filter.fields() {
        for condition in conditions {
            let sf = StringFilter::builder()
                .value(condition.value.clone())
                .comparison(StringFilterComparison::from(condition.comparison.as_str()))
                .build();
            builder = match field {
                "RecordState" => builder.record_state(sf),
                "WorkflowStatus" => builder.workflow_status(sf),
                "SeverityLabel" => builder.severity_label(sf),
                "ComplianceStatus" => builder.compliance_status(sf),
                "AwsAccountId" => builder.aws_account_id(sf),
                "ProductArn" => builder.product_arn(sf),
                other => bail!("unsupported findings filter field: {other}"),
            };
        }
    }
    Ok(builder.build())
}

/// Missing members read as empty text; the report never fails on a sparse
/// finding.
trait FieldText {
    fn or_empty(self) -> String;
}

impl<T: AsRef<str> + ?Sized> FieldText for &T {
    fn or_empty(self) -> String {
        self.as_ref().to_string()
    }
}

impl<T: AsRef<str> + ?Sized> FieldText for Option<&T> {
    fn or_empty(self) -> String {
        self.map(|v| v.as_ref().to_string()).unwrap_or_default()
    }
}

pub fn finding_from_sdk(f: &AwsSecurityFinding) -> Finding {
    let associated_standards = f
        .compliance()
        .map(|c| c.associated_standards())
        .unwrap_or_default()
        .iter()
        .map(|s| s.standards_id().or_empty())
        .collect();

    Finding {
        id: f.id().or_empty(),
        title: f.title().or_empty(),
        description: f.description().or_empty(),
        severity_label: f.severity().and_then(|s| s.label()).or_empty(),
        workflow_status: f.workflow().and_then(|w| w.status()).or_empty(),
        account_id: f.aws_account_id().or_empty(),
        created_at: f.created_at().or_empty(),
        last_observed_at: f.last_observed_at().or_empty(),
        product_arn: f.product_arn().or_empty(),
        associated_standards,
        resource_ids: f.resources().iter().map(|r| r.id().or_empty()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Comparison;

    #[test]
    fn severity_filter_maps_to_sdk_members() {
        let filters = to_sdk_filters(&FindingFilter::active_new_critical_high()).expect("filters");

        assert_eq!(filters.record_state().len(), 1);
        assert_eq!(filters.record_state()[0].value(), Some("ACTIVE"));
        assert_eq!(
            filters.record_state()[0].comparison(),
            Some(&StringFilterComparison::Equals)
        );
        assert_eq!(filters.workflow_status()[0].value(), Some("NEW"));

        let labels: Vec<Option<&str>> = filters
            .severity_label()
            .iter()
            .map(|sf| sf.value())
            .collect();
        assert_eq!(labels, vec![Some("CRITICAL"), Some("HIGH")]);
    }

    #[test]
    fn non_equality_comparisons_are_kept() {
        let filter = FindingFilter::new().with(
            "ProductArn",
            "arn:aws:securityhub:",
            Comparison::Prefix,
        );
        let filters = to_sdk_filters(&filter).expect("filters");
        assert_eq!(
            filters.product_arn()[0].comparison(),
            Some(&StringFilterComparison::Prefix)
        );
    }

    #[test]
    fn unknown_filter_field_is_rejected() {
        let filter = FindingFilter::new().equals("ComplianceAssociatedStandardsId", "x");
        let err = to_sdk_filters(&filter).expect_err("unsupported");
        assert!(
            err.to_string().contains("ComplianceAssociatedStandardsId"),
            "err={err}"
        );
    }
}
