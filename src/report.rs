use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::dashboard::{DashboardFilter, DimensionFilter};
use crate::models::DashboardMetrics;

fn filter_label(filter: &DimensionFilter) -> &str {
    match filter {
        DimensionFilter::All => "all",
        DimensionFilter::Only(value) => value.as_str(),
    }
}

fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

pub fn build_report(
    filter: &DashboardFilter,
    metrics: &DashboardMetrics,
    generated_at: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Academic Dashboard Report");
    let _ = writeln!(
        output,
        "Academic year {}, level {}, group {} (generated {})",
        filter_label(&filter.academic_year),
        filter_label(&filter.level),
        filter_label(&filter.group),
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if metrics.total_students == 0 {
        let _ = writeln!(output, "No graded students match these filters.");
    } else {
        let _ = writeln!(output, "- Students: {}", metrics.total_students);
        let _ = writeln!(output, "- Records: {}", metrics.row_count);
        let _ = writeln!(output, "- Global average: {}", score(metrics.global_average));
        let _ = writeln!(output, "- Pass rate: {}", percent(metrics.pass_rate));
        if let Some(trend) = metrics.trend {
            let _ = writeln!(output, "- Trend vs previous term: {trend:+.2}");
        }
        if let Some(updated) = metrics.last_updated {
            let _ = writeln!(output, "- Last updated: {}", updated.format("%Y-%m-%d %H:%M"));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");
    for entry in &metrics.subject_averages {
        let _ = writeln!(
            output,
            "- {}: {} across {} scores",
            entry.subject.label(),
            score(entry.average),
            entry.count
        );
    }
    if let (Some(best), Some(worst)) = (metrics.best_subject, metrics.worst_subject) {
        let _ = writeln!(output);
        let _ = writeln!(output, "Strongest subject: {}. Weakest subject: {}.", best.label(), worst.label());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Terms");
    if metrics.term_averages.is_empty() {
        let _ = writeln!(output, "No term data for these filters.");
    } else {
        for entry in &metrics.term_averages {
            let _ = writeln!(
                output,
                "- Term {}: {:.2} ({} records)",
                entry.term, entry.average, entry.count
            );
        }
    }

    for (title, averages) in [("Levels", &metrics.level_averages), ("Groups", &metrics.group_averages)] {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {title}");
        if averages.is_empty() {
            let _ = writeln!(output, "No data for these filters.");
        } else {
            for entry in averages {
                let _ = writeln!(
                    output,
                    "- {}: {:.2} ({} records)",
                    entry.key, entry.average, entry.count
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::compute_dashboard;
    use crate::models::{StudentAcademicRow, Subject, SubjectScores};
    use chrono::TimeZone;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 8, 0, 0).unwrap()
    }

    #[test]
    fn empty_dashboard_reports_no_students() {
        let filter = DashboardFilter::default();
        let metrics = compute_dashboard(&[], &filter);
        let report = build_report(&filter, &metrics, generated_at());
        assert!(report.contains("Academic year all, level all, group all"));
        assert!(report.contains("No graded students match these filters."));
        assert!(report.contains("- Catalan: - across 0 scores"));
        assert!(report.contains("No term data for these filters."));
    }

    #[test]
    fn report_lists_terms_and_trend() {
        let make = |term: i32, catalan: &str| {
            let mut scores = SubjectScores::default();
            scores.set(Subject::Catalan, catalan);
            StudentAcademicRow {
                id: None,
                student_id: None,
                student_name: Some("Aina Puig".to_string()),
                academic_year: "2025-2026".to_string(),
                level: "1 ESO".to_string(),
                group: "A".to_string(),
                term,
                scores,
                created_at: None,
            }
        };
        let rows = vec![make(1, "6"), make(2, "7,5")];
        let filter = DashboardFilter {
            group: DimensionFilter::Only("A".to_string()),
            ..DashboardFilter::default()
        };
        let metrics = compute_dashboard(&rows, &filter);
        let report = build_report(&filter, &metrics, generated_at());

        assert!(report.contains("group A"));
        assert!(report.contains("- Pass rate: 100.0%"));
        assert!(report.contains("- Trend vs previous term: +1.50"));
        assert!(report.contains("- Term 1: 6.00 (1 records)"));
        assert!(report.contains("- Term 2: 7.50 (1 records)"));
        assert!(report.contains("Strongest subject: Catalan. Weakest subject: Catalan."));
    }
}
