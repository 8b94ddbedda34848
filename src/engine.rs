use std::time::Duration;

use anyhow::Result;

use crate::config::ChecksSource;
use crate::core::{CheckOutcome, FindingFilter, PagedTotal, retain_standard};
use crate::hub::{FindingPages, SecurityHubApi};
use crate::logs::ReportSink;
use crate::platform::LoggedRun;
use crate::ui::{Marker, finding_block};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Standards,
    Aggregator,
    ActiveIssues,
    CriticalHigh,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Standards,
        Section::Aggregator,
        Section::ActiveIssues,
        Section::CriticalHigh,
    ];
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub standard_id: String,
    pub count_page_size: i32,
    pub severity_page_size: i32,
    pub page_delay: Duration,
    pub checks: ChecksSource,
    pub aws_cli: String,
    /// Extra global arguments for the `aws` CLI (`--region`, `--profile`).
    pub aws_cli_args: Vec<String>,
    pub command_timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionResults {
    pub checks: Vec<CheckOutcome>,
    pub active_issues: Option<PagedTotal>,
    pub critical_high: Option<PagedTotal>,
}

pub struct Engine<'a, A> {
    api: &'a A,
    opts: EngineOptions,
}

impl<'a, A: SecurityHubApi> Engine<'a, A> {
    pub fn new(api: &'a A, opts: EngineOptions) -> Self {
        Self { api, opts }
    }

    /// Runs `sections` in order. Check failures are logged and skipped; a
    /// findings API failure stops the run.
    pub async fn run(&self, sink: &mut ReportSink, sections: &[Section]) -> Result<SectionResults> {
        let mut results = SectionResults::default();
        for section in sections {
            match section {
                Section::Standards => {
                    results.checks.push(self.check_enabled_standards(sink).await?);
                }
                Section::Aggregator => {
                    results.checks.push(self.check_finding_aggregator(sink).await?);
                }
                Section::ActiveIssues => {
                    results.active_issues = Some(self.count_active_issues(sink).await?);
                }
                Section::CriticalHigh => {
                    results.critical_high = Some(self.list_critical_high(sink).await?);
                }
            }
        }
        Ok(results)
    }

    pub async fn check_enabled_standards(&self, sink: &mut ReportSink) -> Result<CheckOutcome> {
        sink.info("Checking enabled security standards")?;
        let mut outcome = CheckOutcome {
            section: "standards".to_string(),
            ok: true,
            warnings: vec![],
        };

        if self.opts.checks == ChecksSource::Cli {
            let run = self.run_aws_cli(sink, &["securityhub", "get-enabled-standards"])?;
            record(&mut outcome, run);
            return Ok(outcome);
        }

        let subscriptions = match self.api.enabled_standards().await {
            Ok(subs) => subs,
            Err(err) => {
                warn(sink, &mut outcome, format!("{err:#}"))?;
                return Ok(outcome);
            }
        };

        if subscriptions.is_empty() {
            warn(sink, &mut outcome, "No security standards are enabled".to_string())?;
            return Ok(outcome);
        }

        let mut target_status = None;
        for sub in &subscriptions {
            sink.line(&format!("  {:<12}{}", sub.status, sub.standards_arn))?;
            if standards_arn_matches(&sub.standards_arn, &self.opts.standard_id) {
                target_status = Some(sub.status.clone());
            }
        }
        match target_status {
            Some(status) => sink.emit(
                Marker::Done,
                &format!("{} is enabled ({status})", self.opts.standard_id),
            )?,
            None => warn(
                sink,
                &mut outcome,
                format!("{} is not enabled", self.opts.standard_id),
            )?,
        }
        Ok(outcome)
    }

    pub async fn check_finding_aggregator(&self, sink: &mut ReportSink) -> Result<CheckOutcome> {
        sink.info("Checking configured finding aggregator")?;
        let mut outcome = CheckOutcome {
            section: "aggregator".to_string(),
            ok: true,
            warnings: vec![],
        };

        if self.opts.checks == ChecksSource::Cli {
            let listed = self.run_aws_cli(
                sink,
                &[
                    "securityhub",
                    "list-finding-aggregators",
                    "--query",
                    "FindingAggregators[0].FindingAggregatorArn",
                    "--output",
                    "text",
                ],
            )?;
            let arn = listed.stdout.clone();
            let failed = !listed.ok();
            record(&mut outcome, listed);
            if arn.is_empty() || arn == "None" {
                if !failed {
                    warn(sink, &mut outcome, "No finding aggregator is configured".to_string())?;
                }
                return Ok(outcome);
            }
            let described = self.run_aws_cli(
                sink,
                &[
                    "securityhub",
                    "get-finding-aggregator",
                    "--finding-aggregator-arn",
                    &arn,
                ],
            )?;
            record(&mut outcome, described);
            return Ok(outcome);
        }

        let arns = match self.api.finding_aggregator_arns().await {
            Ok(arns) => arns,
            Err(err) => {
                warn(sink, &mut outcome, format!("{err:#}"))?;
                return Ok(outcome);
            }
        };
        let Some(arn) = arns.first() else {
            warn(sink, &mut outcome, "No finding aggregator is configured".to_string())?;
            return Ok(outcome);
        };

        match self.api.finding_aggregator(arn).await {
            Ok(detail) => {
                let regions = if detail.regions.is_empty() {
                    "-".to_string()
                } else {
                    detail.regions.join(", ")
                };
                sink.line(&format!("  ARN:                 {}", detail.arn))?;
                sink.line(&format!("  Aggregation region:  {}", detail.aggregation_region))?;
                sink.line(&format!("  Region linking mode: {}", detail.region_linking_mode))?;
                sink.line(&format!("  Regions:             {regions}"))?;
            }
            Err(err) => warn(sink, &mut outcome, format!("{err:#}"))?,
        }
        Ok(outcome)
    }

    pub async fn count_active_issues(&self, sink: &mut ReportSink) -> Result<PagedTotal> {
        sink.info("Counting active findings")?;
        let mut pages = FindingPages::new(
            self.api,
            FindingFilter::active_new(),
            self.opts.count_page_size,
        );

        let mut totals = PagedTotal::default();
        while let Some(page) = next_page(&mut pages, "counting active findings").await? {
            let kept = retain_standard(page.findings, &self.opts.standard_id);
            let running = totals.record_page(kept.len());
            sink.emit(
                Marker::Progress,
                &format!(
                    "Page {}: {} findings (running total: {running})",
                    totals.pages(),
                    kept.len()
                ),
            )?;
            if !self.opts.page_delay.is_zero() {
                tokio::time::sleep(self.opts.page_delay).await;
            }
        }

        sink.emit(Marker::Done, &format!("Total ACTIVE issues: {}", totals.total))?;
        Ok(totals)
    }

    pub async fn list_critical_high(&self, sink: &mut ReportSink) -> Result<PagedTotal> {
        sink.info("Listing active findings of critical and high severity")?;
        let mut pages = FindingPages::new(
            self.api,
            FindingFilter::active_new_critical_high(),
            self.opts.severity_page_size,
        );

        let mut totals = PagedTotal::default();
        while let Some(page) = next_page(&mut pages, "listing critical/high findings").await? {
            let kept = retain_standard(page.findings, &self.opts.standard_id);
            for finding in &kept {
                sink.lines(&finding_block(finding))?;
            }
            totals.record_page(kept.len());
            sink.emit(
                Marker::Progress,
                &format!("Finished page {} of critical/high findings", totals.pages()),
            )?;
        }

        sink.emit(
            Marker::Done,
            &format!("Total HIGH/CRITICAL findings: {}", totals.total),
        )?;
        Ok(totals)
    }

    fn run_aws_cli(&self, sink: &mut ReportSink, args: &[&str]) -> Result<LoggedRun> {
        let mut full: Vec<&str> = args.to_vec();
        full.extend(self.opts.aws_cli_args.iter().map(String::as_str));
        full.push("--no-cli-pager");
        crate::platform::run_logged(sink, &self.opts.aws_cli, &full, self.opts.command_timeout)
    }
}

async fn next_page<A: SecurityHubApi>(
    pages: &mut FindingPages<'_, A>,
    what: &str,
) -> Result<Option<crate::core::Page>> {
    pages.next_page().await.map_err(|err| {
        crate::exit::api_err(err.context(format!("Security Hub request failed while {what}")))
    })
}

fn warn(sink: &mut ReportSink, outcome: &mut CheckOutcome, message: String) -> Result<()> {
    sink.warn(&message)?;
    outcome.ok = false;
    outcome.warnings.push(message);
    Ok(())
}

/// Warnings from an `aws` CLI call were already written by `run_logged`.
fn record(outcome: &mut CheckOutcome, run: LoggedRun) {
    if !run.ok() {
        outcome.ok = false;
        outcome.warnings.extend(run.warnings);
    }
}

/// Subscription ARNs look like `arn:aws:securityhub:<region>::<standard id>`
/// (or without a region for global standards).
fn standards_arn_matches(standards_arn: &str, standard_id: &str) -> bool {
    standards_arn == standard_id
        || standards_arn
            .strip_suffix(standard_id)
            .is_some_and(|head| head.ends_with(':'))
}
