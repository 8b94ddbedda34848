use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::{ChecksSource, EffectiveConfig};
use crate::core::RunSummary;
use crate::engine::{Engine, EngineOptions, Section, SectionResults};
use crate::hub::sdk::{SdkHub, SdkOptions};
use crate::logs::ReportSink;
use crate::ui::Marker;

#[derive(Debug, Parser)]
#[command(
    name = "hubreport",
    version,
    about = "Report enabled standards, aggregator setup and active findings from AWS Security Hub"
)]
pub struct Cli {
    /// Print a JSON run summary to stdout instead of echoing the report
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    /// Write the report file only
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub region: Option<String>,
    #[arg(long, global = true)]
    pub profile: Option<String>,
    /// Standard id findings must be associated with
    #[arg(long, global = true)]
    pub standard: Option<String>,
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,
    /// Timeout in seconds for external `aws` CLI calls
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,
    /// Run the standards/aggregator checks through the `aws` CLI
    #[arg(long, global = true)]
    pub checks_via_cli: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// All sections (default)
    Run,
    Standards,
    Aggregator,
    Count,
    Severity,
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

impl Commands {
    /// Report sections a subcommand runs; empty for the local-only commands.
    fn sections(&self) -> &'static [Section] {
        match self {
            Commands::Run => &Section::ALL,
            Commands::Standards => &[Section::Standards],
            Commands::Aggregator => &[Section::Aggregator],
            Commands::Count => &[Section::ActiveIssues],
            Commands::Severity => &[Section::CriticalHigh],
            Commands::Completion(_) | Commands::Config(_) => &[],
        }
    }
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Completions need neither HOME nor a readable config file.
    if let Some(Commands::Completion(args)) = &cli.command {
        return write_completion(&args.shell);
    }

    let home_dir = crate::platform::effective_home_dir().map_err(crate::exit::invalid_args_err)?;
    let env_config_path = std::env::var_os("HUBREPORT_CONFIG").map(PathBuf::from);
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;
    apply_cli_overrides(&mut cfg, &cli);
    crate::config::validate(&cfg).map_err(crate::exit::invalid_args_err)?;

    let sections = match &cli.command {
        Some(Commands::Config(args)) => {
            if args.show {
                let rendered = render_config(&cfg, cli.json).map_err(crate::exit::internal_err)?;
                write_stdout(rendered.as_bytes())?;
            } else if !cli.quiet {
                eprintln!("config: use `hubreport config --show`");
            }
            return Ok(());
        }
        Some(command) => command.sections(),
        None => Commands::Run.sections(),
    };

    // Read the local offset before any other thread exists.
    let started_at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let path = crate::logs::output_path(&cfg.report.output_dir, started_at)?;
    let console: Option<Box<dyn Write>> = if cli.quiet || cli.json {
        None
    } else {
        Some(Box::new(io::stdout()))
    };
    let mut sink = ReportSink::create(&path, console)?;
    sink.info(&format!("Setting up output file: {}", path.display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
        .map_err(crate::exit::internal_err)?;
    let sdk_opts = SdkOptions {
        region: cfg.aws.region.clone(),
        profile: cfg.aws.profile.clone(),
        max_attempts: cfg.aws.max_attempts,
    };
    let engine_opts = engine_options(&cfg, cli.timeout);
    let results = runtime.block_on(async {
        let hub = SdkHub::connect(&sdk_opts).await;
        Engine::new(&hub, engine_opts).run(&mut sink, sections).await
    })?;

    sink.emit(Marker::Done, "Process complete")?;

    if cli.json {
        let summary = run_summary(&cfg, &path, started_at, results);
        write_json(&summary)?;
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose {
        "hubreport=debug,aws_config=info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_cli_overrides(cfg: &mut EffectiveConfig, cli: &Cli) {
    if let Some(region) = &cli.region {
        cfg.aws.region = Some(region.clone());
    }
    if let Some(profile) = &cli.profile {
        cfg.aws.profile = Some(profile.clone());
    }
    if let Some(standard) = &cli.standard {
        cfg.report.standard_id = standard.clone();
    }
    if let Some(dir) = &cli.output_dir {
        cfg.report.output_dir = dir.clone();
    }
    if cli.checks_via_cli {
        cfg.checks.source = ChecksSource::Cli;
    }
}

fn engine_options(cfg: &EffectiveConfig, timeout_secs: u64) -> EngineOptions {
    let mut aws_cli_args = Vec::new();
    if let Some(region) = &cfg.aws.region {
        aws_cli_args.extend(["--region".to_string(), region.clone()]);
    }
    if let Some(profile) = &cfg.aws.profile {
        aws_cli_args.extend(["--profile".to_string(), profile.clone()]);
    }

    EngineOptions {
        standard_id: cfg.report.standard_id.clone(),
        count_page_size: cfg.report.count_page_size,
        severity_page_size: cfg.report.severity_page_size,
        page_delay: Duration::from_millis(cfg.report.page_delay_ms),
        checks: cfg.checks.source,
        aws_cli: cfg.checks.aws_cli.clone(),
        aws_cli_args,
        command_timeout: Duration::from_secs(timeout_secs),
    }
}

fn run_summary(
    cfg: &EffectiveConfig,
    path: &std::path::Path,
    started_at: OffsetDateTime,
    results: SectionResults,
) -> RunSummary {
    RunSummary {
        schema_version: "1.0".to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        output_file: path.display().to_string(),
        standard_id: cfg.report.standard_id.clone(),
        checks: results.checks,
        active_issues: results.active_issues,
        critical_high: results.critical_high,
    }
}

fn write_json(summary: &RunSummary) -> Result<()> {
    let mut buf = serde_json::to_vec_pretty(summary)
        .context("failed to serialize run summary")
        .map_err(crate::exit::internal_err)?;
    buf.push(b'\n');
    write_stdout(&buf)
}

fn render_config(cfg: &EffectiveConfig, json: bool) -> Result<String> {
    if json {
        let mut s = serde_json::to_string_pretty(cfg).context("failed to serialize config")?;
        s.push('\n');
        Ok(s)
    } else {
        toml::to_string_pretty(cfg).context("failed to serialize config")
    }
}

fn write_completion(shell: &str) -> Result<()> {
    let shell = parse_shell(shell)?;
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "hubreport", &mut buf);
    write_stdout(&buf)
}

/// A closed pipe (`| head`) is not an error.
fn write_stdout(buf: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match stdout.write_all(buf).and_then(|()| stdout.flush()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(crate::exit::output_err(
            anyhow::Error::new(err).context("failed to write to stdout"),
        )),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
