use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::FSBP_STANDARD_ID;
use crate::hub::MAX_PAGE_SIZE;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub aws: AwsConfig,
    pub report: ReportConfig,
    pub checks: ChecksConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AwsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub standard_id: String,
    pub output_dir: PathBuf,
    pub count_page_size: i32,
    pub severity_page_size: i32,
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecksConfig {
    pub source: ChecksSource,
    pub aws_cli: String,
}

/// Where the standards/aggregator checks get their data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksSource {
    Sdk,
    Cli,
}

impl FromStr for ChecksSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sdk" => Ok(ChecksSource::Sdk),
            "cli" => Ok(ChecksSource::Cli),
            other => Err(format!("invalid checks source: {other} (expected sdk|cli)")),
        }
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            aws: AwsConfig {
                region: None,
                profile: None,
                max_attempts: 5,
            },
            report: ReportConfig {
                standard_id: FSBP_STANDARD_ID.to_string(),
                output_dir: PathBuf::from("."),
                count_page_size: 100,
                severity_page_size: 50,
                page_delay_ms: 0,
            },
            checks: ChecksConfig {
                source: ChecksSource::Sdk,
                aws_cli: "aws".to_string(),
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    aws: Option<RawAwsConfig>,
    report: Option<RawReportConfig>,
    checks: Option<RawChecksConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAwsConfig {
    region: Option<String>,
    profile: Option<String>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReportConfig {
    standard_id: Option<String>,
    output_dir: Option<PathBuf>,
    count_page_size: Option<i32>,
    severity_page_size: Option<i32>,
    page_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChecksConfig {
    source: Option<ChecksSource>,
    aws_cli: Option<String>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/hubreport/config.toml")
}

/// Defaults, then the TOML file (if present), then `HUBREPORT_*` variables.
pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        return Err(anyhow!("config file not found: {}", path.display()));
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(aws) = raw.aws {
        if aws.region.is_some() {
            cfg.aws.region = aws.region;
        }
        if aws.profile.is_some() {
            cfg.aws.profile = aws.profile;
        }
        if let Some(max_attempts) = aws.max_attempts {
            cfg.aws.max_attempts = max_attempts;
        }
    }

    if let Some(report) = raw.report {
        if let Some(standard_id) = report.standard_id {
            cfg.report.standard_id = standard_id;
        }
        if let Some(output_dir) = report.output_dir {
            cfg.report.output_dir = output_dir;
        }
        if let Some(n) = report.count_page_size {
            cfg.report.count_page_size = n;
        }
        if let Some(n) = report.severity_page_size {
            cfg.report.severity_page_size = n;
        }
        if let Some(ms) = report.page_delay_ms {
            cfg.report.page_delay_ms = ms;
        }
    }

    if let Some(checks) = raw.checks {
        if let Some(source) = checks.source {
            cfg.checks.source = source;
        }
        if let Some(aws_cli) = checks.aws_cli {
            cfg.checks.aws_cli = aws_cli;
        }
    }
}

fn non_empty(v: String) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

pub fn apply_env_overrides(
    cfg: &mut EffectiveConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = var("HUBREPORT_AWS_REGION").and_then(non_empty) {
        cfg.aws.region = Some(v);
    }
    if let Some(v) = var("HUBREPORT_AWS_PROFILE").and_then(non_empty) {
        cfg.aws.profile = Some(v);
    }
    if let Some(v) = var("HUBREPORT_AWS_MAX_ATTEMPTS") {
        cfg.aws.max_attempts = v
            .trim()
            .parse::<u32>()
            .with_context(|| "HUBREPORT_AWS_MAX_ATTEMPTS")?;
    }
    if let Some(v) = var("HUBREPORT_STANDARD_ID").and_then(non_empty) {
        cfg.report.standard_id = v;
    }
    if let Some(v) = var("HUBREPORT_OUTPUT_DIR").and_then(non_empty) {
        cfg.report.output_dir = PathBuf::from(v);
    }
    if let Some(v) = var("HUBREPORT_PAGE_DELAY_MS") {
        cfg.report.page_delay_ms = v
            .trim()
            .parse::<u64>()
            .with_context(|| "HUBREPORT_PAGE_DELAY_MS")?;
    }
    if let Some(v) = var("HUBREPORT_CHECKS_SOURCE") {
        cfg.checks.source = v
            .parse::<ChecksSource>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "HUBREPORT_CHECKS_SOURCE")?;
    }

    Ok(())
}

pub fn validate(cfg: &EffectiveConfig) -> Result<()> {
    for (name, size) in [
        ("report.count_page_size", cfg.report.count_page_size),
        ("report.severity_page_size", cfg.report.severity_page_size),
    ] {
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(anyhow!(
                "{name} must be between 1 and {MAX_PAGE_SIZE} (got {size})"
            ));
        }
    }
    if cfg.aws.max_attempts == 0 {
        return Err(anyhow!("aws.max_attempts must be at least 1"));
    }
    if cfg.report.standard_id.trim().is_empty() {
        return Err(anyhow!("report.standard_id must not be empty"));
    }
    if cfg.checks.aws_cli.trim().is_empty() {
        return Err(anyhow!("checks.aws_cli must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_report_procedures() {
        let cfg = EffectiveConfig::default();
        assert_eq!(cfg.report.count_page_size, 100);
        assert_eq!(cfg.report.severity_page_size, 50);
        assert_eq!(cfg.report.page_delay_ms, 0);
        assert_eq!(cfg.aws.max_attempts, 5);
        assert_eq!(cfg.report.standard_id, FSBP_STANDARD_ID);
        assert_eq!(cfg.checks.source, ChecksSource::Sdk);
        validate(&cfg).expect("defaults are valid");
    }

    #[test]
    fn raw_config_overrides_only_given_keys() {
        let raw: RawConfig = toml::from_str(
            r#"
[aws]
region = "eu-west-1"

[report]
severity_page_size = 25

[checks]
source = "cli"
"#,
        )
        .expect("parse");
        let mut cfg = EffectiveConfig::default();
        apply_raw_config(&mut cfg, raw);
        assert_eq!(cfg.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(cfg.aws.profile, None);
        assert_eq!(cfg.report.severity_page_size, 25);
        assert_eq!(cfg.report.count_page_size, 100);
        assert_eq!(cfg.checks.source, ChecksSource::Cli);
        assert_eq!(cfg.checks.aws_cli, "aws");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = toml::from_str::<RawConfig>("[report]\npage_size = 10\n").expect_err("unknown");
        assert!(err.to_string().contains("page_size"), "err={err}");
    }

    #[test]
    fn env_overrides_apply_and_blank_values_are_ignored() {
        let mut cfg = EffectiveConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("HUBREPORT_AWS_PROFILE", "audit"),
                ("HUBREPORT_AWS_REGION", "  "),
                ("HUBREPORT_PAGE_DELAY_MS", "100"),
                ("HUBREPORT_CHECKS_SOURCE", "CLI"),
                ("HUBREPORT_STANDARD_ID", "standards/pci-dss/v/3.2.1"),
            ]),
        )
        .expect("apply");
        assert_eq!(cfg.aws.profile.as_deref(), Some("audit"));
        assert_eq!(cfg.aws.region, None);
        assert_eq!(cfg.report.page_delay_ms, 100);
        assert_eq!(cfg.checks.source, ChecksSource::Cli);
        assert_eq!(cfg.report.standard_id, "standards/pci-dss/v/3.2.1");
    }

    #[test]
    fn env_override_reports_bad_number() {
        let mut cfg = EffectiveConfig::default();
        let err = apply_env_overrides(&mut cfg, env(&[("HUBREPORT_AWS_MAX_ATTEMPTS", "many")]))
            .expect_err("bad number");
        assert!(format!("{err:#}").contains("HUBREPORT_AWS_MAX_ATTEMPTS"));
    }

    #[test]
    fn validate_rejects_out_of_range_page_size() {
        let mut cfg = EffectiveConfig::default();
        cfg.report.count_page_size = 101;
        let err = validate(&cfg).expect_err("too large");
        assert!(err.to_string().contains("report.count_page_size"), "err={err}");

        let mut cfg = EffectiveConfig::default();
        cfg.report.severity_page_size = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts_and_blank_standard() {
        let mut cfg = EffectiveConfig::default();
        cfg.aws.max_attempts = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = EffectiveConfig::default();
        cfg.report.standard_id = " ".to_string();
        assert!(validate(&cfg).is_err());
    }
}
