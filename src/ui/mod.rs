use anyhow::Error;
use std::io::{self, Write};

use crate::core::Finding;

pub const BLOCK_RULE: &str =
    "-------------------------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Info,
    Progress,
    Done,
    Warn,
}

impl Marker {
    pub const fn prefix(self) -> &'static str {
        match self {
            Marker::Info => "[info]",
            Marker::Progress => "[....]",
            Marker::Done => "[done]",
            Marker::Warn => "[warn]",
        }
    }
}

pub fn report_line(marker: Marker, message: &str) -> String {
    format!("{} {message}", marker.prefix())
}

/// Labelled rows of a finding block, in display order.
pub fn finding_fields(f: &Finding) -> [(&'static str, String); 8] {
    [
        ("Id", f.id.clone()),
        ("Product ARN", f.product_arn.clone()),
        ("Account ID", f.account_id.clone()),
        ("Created At", f.created_at.clone()),
        ("Last Seen", f.last_observed_at.clone()),
        ("Status", f.workflow_status.clone()),
        ("Description", f.flat_description()),
        ("Resource", f.first_resource_id().to_string()),
    ]
}

pub fn finding_block(f: &Finding) -> Vec<String> {
    let mut lines = Vec::with_capacity(12);
    lines.push(BLOCK_RULE.to_string());
    lines.push(format!("[{}] {}", f.severity_label, f.title));
    for (label, value) in finding_fields(f) {
        let label = format!("{label}:");
        lines.push(format!("  {label:<13}{value}").trim_end().to_string());
    }
    lines.push(BLOCK_RULE.to_string());
    lines.push(String::new());
    lines
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(
        stderr,
        "  - re-run with `--verbose` (or RUST_LOG=debug) for SDK diagnostics"
    );
    let _ = writeln!(
        stderr,
        "  - check credentials and region with `aws sts get-caller-identity`"
    );
}
