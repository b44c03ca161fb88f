use std::fmt::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::models::{Query, ResultItem, Status, Trend};

const STATUS_ORDER: [Status; 5] = [
    Status::Safe,
    Status::Tight,
    Status::Risk,
    Status::Unknown,
    Status::EnterPoints,
];

const TREND_ORDER: [Trend; 4] = [
    Trend::Rising,
    Trend::Falling,
    Trend::Volatile,
    Trend::Stable,
];

/// Human-readable summary of the active filters.
pub fn scope_label(query: &Query) -> String {
    let mut parts = Vec::new();

    if let Some(course) = &query.course {
        parts.push(format!("course \"{course}\""));
    }
    if !query.institutions.is_empty() {
        parts.push(query.institutions.join(", "));
    }
    if !query.clusters.is_empty() {
        parts.push(query.clusters.join(", "));
    }
    if let Some(points) = query.points {
        let suffix = if query.reach { " with reach" } else { "" };
        parts.push(format!("{points} points{suffix}"));
    }

    if parts.is_empty() {
        "unconstrained".to_string()
    } else {
        parts.join("; ")
    }
}

fn format_cutoff(value: Option<f64>) -> String {
    match value {
        Some(cutoff) => format!("{cutoff:.3}"),
        None => "n/a".to_string(),
    }
}

pub fn build_report(
    query: &Query,
    generated_on: NaiveDate,
    items: &[ResultItem],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Programme Shortlist Report");
    let _ = writeln!(
        output,
        "Generated on {} for {}",
        generated_on,
        scope_label(query)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if items.is_empty() {
        let _ = writeln!(output, "No programmes matched these filters.");
    } else {
        for status in STATUS_ORDER {
            let count = items.iter().filter(|item| item.status == status).count();
            if count > 0 {
                let _ = writeln!(output, "- {status}: {count} programmes");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend Mix");

    if items.is_empty() {
        let _ = writeln!(output, "No programmes matched these filters.");
    } else {
        for trend in TREND_ORDER {
            let count = items.iter().filter(|item| item.trend == trend).count();
            if count > 0 {
                let _ = writeln!(output, "- {trend}: {count} programmes");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Programmes (by latest cutoff)");

    if items.is_empty() {
        let _ = writeln!(output, "No programmes matched these filters.");
    } else {
        for item in items.iter().take(10) {
            let diff_note = match item.diff {
                Some(diff) => format!(" ({diff:+.3})"),
                None => String::new(),
            };
            let _ = writeln!(
                output,
                "- [{}] {} ({}, {}) cutoff {} status {}{} trend {}",
                item.code,
                item.name,
                item.institution,
                item.cluster,
                format_cutoff(item.effective_cutoff),
                item.status,
                diff_note,
                item.trend
            );
        }
    }

    output
}

/// Re-serialize the shortlist as CSV, one row per programme, verbatim.
/// Returns the number of data rows written.
pub fn write_csv(path: &Path, items: &[ResultItem]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "Programme",
        "Institution",
        "Code",
        "Cluster",
        "Cutoff",
        "Diff",
        "Status",
        "Trend",
    ])?;

    for item in items {
        let cutoff = item
            .effective_cutoff
            .map(|value| value.to_string())
            .unwrap_or_default();
        let diff = item.diff.map(|value| value.to_string()).unwrap_or_default();
        let status = item.status.to_string();
        let trend = item.trend.to_string();

        writer.write_record([
            item.name.as_str(),
            item.institution.as_str(),
            item.code.as_str(),
            item.cluster.as_str(),
            cutoff.as_str(),
            diff.as_str(),
            status.as_str(),
            trend.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(items.len())
}
