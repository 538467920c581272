use std::fmt::Write;
use std::io;

use chrono::NaiveDate;
use serde::Serialize;

use crate::history::TrackedWarning;
use crate::models::{format_hours, format_percentage, SummaryRow, Tier, TierSummary};

pub fn summarize_by_tier(tracked: &[TrackedWarning]) -> Vec<TierSummary> {
    let mut map: std::collections::BTreeMap<Tier, (usize, f64)> =
        std::collections::BTreeMap::new();

    for item in tracked {
        let entry = map.entry(item.warning.tier).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += item.warning.percentage;
    }

    map.into_iter()
        .rev()
        .map(|(tier, (count, total_percentage))| TierSummary {
            tier,
            count,
            avg_percentage: if count == 0 {
                0.0
            } else {
                total_percentage / count as f64
            },
        })
        .collect()
}

/// Most severe first, then highest percentage.
pub fn sort_by_severity(tracked: &mut [TrackedWarning]) {
    tracked.sort_by(|a, b| {
        b.warning
            .tier
            .cmp(&a.warning.tier)
            .then_with(|| {
                b.warning
                    .percentage
                    .partial_cmp(&a.warning.percentage)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub fn status_label(item: &TrackedWarning) -> String {
    match (item.notified, item.last_update) {
        (true, Some(at)) => format!("sent {}", at.format("%Y-%m-%d %H:%M")),
        (true, None) => "sent".to_string(),
        (false, _) => "pending".to_string(),
    }
}

pub fn build_report(
    generated_on: NaiveDate,
    source: &str,
    event_count: usize,
    tracked: &[TrackedWarning],
    summary: &[SummaryRow],
) -> String {
    let tiers = summarize_by_tier(tracked);
    let mut warnings = tracked.to_vec();
    sort_by_severity(&mut warnings);

    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Warning Report");
    let _ = writeln!(
        output,
        "Generated on {} from {} ({} attendance events)",
        generated_on, source, event_count
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Warning Mix");

    if tiers.is_empty() {
        let _ = writeln!(output, "No student reached 15% of absences.");
    } else {
        for tier in tiers.iter() {
            let _ = writeln!(
                output,
                "- {}: {} warnings (avg {})",
                tier.tier,
                tier.count,
                format_percentage(tier.avg_percentage)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Warnings");

    if warnings.is_empty() {
        let _ = writeln!(output, "No warnings for this export.");
    } else {
        for item in warnings.iter() {
            let warning = &item.warning;
            let _ = writeln!(
                output,
                "- [{}] {} ({}, {}) {}: {} of {} h, {}",
                warning.tier,
                warning.student,
                warning.group,
                warning.program,
                warning.subject_label(),
                warning.percentage_label(),
                format_hours(warning.total_hours),
                status_label(item)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if summary.is_empty() {
        let _ = writeln!(output, "No absences or delays recorded.");
    } else {
        let _ = writeln!(
            output,
            "| Student | Program | Group | Subject | Total h | Absence h | Delay h | Effective h | % |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
        for row in summary {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                row.student,
                row.program_label(),
                row.group,
                row.subject,
                format_hours(row.total_hours),
                format_hours(row.absence_hours),
                format_hours(row.delay_hours),
                format_hours(row.effective_hours),
                format_percentage(row.percentage)
            );
        }
    }

    output
}

#[derive(Serialize)]
struct WarningExportRow<'a> {
    warning_id: &'a str,
    sent: bool,
    sent_at: String,
    student: &'a str,
    group: &'a str,
    subject: &'a str,
    program: &'a str,
    total_hours: String,
    absence_hours: String,
    delay_hours: String,
    effective_hours: String,
    percentage: String,
    tier: &'static str,
}

pub fn write_warnings_csv<W: io::Write>(
    writer: W,
    tracked: &[TrackedWarning],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for item in tracked {
        let warning = &item.warning;
        writer.serialize(WarningExportRow {
            warning_id: &item.id,
            sent: item.notified,
            sent_at: item
                .last_update
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            student: &warning.student,
            group: &warning.group,
            subject: &warning.subject,
            program: warning.program.as_str(),
            total_hours: format_hours(warning.total_hours),
            absence_hours: format_hours(warning.absence_hours),
            delay_hours: format_hours(warning.delay_hours),
            effective_hours: format_hours(warning.effective_hours),
            percentage: warning.percentage_label(),
            tier: warning.tier.label(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProgramId, WarningRecord, WarningScope};

    fn tracked(student: &str, percentage: f64, tier: Tier, notified: bool) -> TrackedWarning {
        let warning = WarningRecord {
            student: student.to_string(),
            subject: "Xarxes".to_string(),
            group: "SMX1".to_string(),
            program: ProgramId::new("SMX"),
            scope: WarningScope::Subject,
            absence_hours: percentage,
            delay_hours: 0.0,
            effective_hours: percentage,
            total_hours: 100.0,
            percentage,
            tier,
        };
        TrackedWarning {
            id: warning.warning_id(),
            warning,
            notified,
            last_update: None,
        }
    }

    fn summary_row() -> SummaryRow {
        SummaryRow {
            student: "Oriol".to_string(),
            program: None,
            group: "DAW1".to_string(),
            subject: "Bases de dades".to_string(),
            total_hours: 0.0,
            absence_hours: 2.0,
            delay_hours: 1.5,
            effective_hours: 2.5,
            percentage: 0.0,
        }
    }

    #[test]
    fn tiers_are_counted_most_severe_first() {
        let items = vec![
            tracked("Anna", 16.0, Tier::Tier15, false),
            tracked("Pau", 30.0, Tier::Tier25, true),
            tracked("Joan", 20.0, Tier::Tier15, false),
        ];
        let tiers = summarize_by_tier(&items);
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[0].tier, Tier::Tier25);
        assert_eq!(tiers[1].count, 2);
        assert!((tiers[1].avg_percentage - 18.0).abs() < 1e-9);
    }

    #[test]
    fn report_lists_warnings_by_severity() {
        let items = vec![
            tracked("Anna", 16.0, Tier::Tier15, false),
            tracked("Pau", 30.0, Tier::Tier25, true),
        ];
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let report = build_report(date, "export.csv", 12, &items, &[summary_row()]);

        assert!(report.starts_with("# Attendance Warning Report\n"));
        assert!(report.contains("Generated on 2025-11-03 from export.csv (12 attendance events)"));
        let pau = report.find("- [25%] Pau (SMX1, SMX) Xarxes: 30.0% of 100.00 h, sent").unwrap();
        let anna = report.find("- [15%] Anna (SMX1, SMX) Xarxes: 16.0% of 100.00 h, pending").unwrap();
        assert!(pau < anna);
        assert!(report.contains("| Oriol | Unknown | DAW1 | Bases de dades | 0.00 | 2.00 | 1.50 | 2.50 | 0.0% |"));
    }

    #[test]
    fn empty_report_says_so() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let report = build_report(date, "export.csv", 0, &[], &[]);
        assert!(report.contains("No student reached 15% of absences."));
        assert!(report.contains("No warnings for this export."));
        assert!(report.contains("No absences or delays recorded."));
    }

    #[test]
    fn csv_export_has_one_row_per_warning() {
        let items = vec![tracked("Pau", 30.0, Tier::Tier25, true)];
        let mut buffer = Vec::new();
        write_warnings_csv(&mut buffer, &items).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("warning_id,sent,sent_at,student,group,subject,program,total_hours,absence_hours,delay_hours,effective_hours,percentage,tier")
        );
        assert_eq!(
            lines.next(),
            Some("Pau_Xarxes_25%,true,,Pau,SMX1,Xarxes,SMX,100.00,30.00,0.00,30.00,30.0%,25%")
        );
        assert_eq!(lines.next(), None);
    }
}
