//! Dashboard aggregation over academic records.
//!
//! Everything here is recomputed from the rows handed in; nothing is cached
//! between calls. Ordered maps keep the floating-point summation order, and
//! therefore the output, identical for identical input.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::str::FromStr;

use crate::models::{
    AggregateBucket, DashboardMetrics, FilterOptions, KeyedAverage, StudentAcademicRow, Subject,
    SubjectAverage, TermAverage,
};
use crate::numeric::{mean, parse_score};

pub const PASSING_AVERAGE: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DimensionFilter {
    #[default]
    All,
    Only(String),
}

impl DimensionFilter {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            DimensionFilter::All => true,
            DimensionFilter::Only(expected) => expected == value,
        }
    }
}

impl FromStr for DimensionFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Ok(DimensionFilter::All)
        } else {
            Ok(DimensionFilter::Only(trimmed.to_string()))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardFilter {
    pub academic_year: DimensionFilter,
    pub level: DimensionFilter,
    pub group: DimensionFilter,
}

impl DashboardFilter {
    pub fn matches(&self, row: &StudentAcademicRow) -> bool {
        self.academic_year.matches(&row.academic_year)
            && self.level.matches(&row.level)
            && self.group.matches(&row.group)
    }
}

/// Mean of the subject scores that parse. `None` when none do.
pub fn row_average(row: &StudentAcademicRow) -> Option<f64> {
    let scores: Vec<f64> = Subject::ALL
        .iter()
        .filter_map(|&subject| row.scores.raw(subject).and_then(parse_score))
        .collect();
    mean(&scores)
}

/// Identity used to group a row under a student: id, then name, then row id,
/// then a key unique to the row's term and position.
fn student_key(row: &StudentAcademicRow, position: usize) -> String {
    if let Some(id) = row.student_id {
        return format!("id:{id}");
    }
    if let Some(name) = row.student_name.as_deref().map(str::trim) {
        if !name.is_empty() {
            return format!("name:{name}");
        }
    }
    if let Some(id) = row.id {
        return format!("row:{id}");
    }
    format!("term:{}:{}", row.term, position)
}

pub fn compute_dashboard(rows: &[StudentAcademicRow], filter: &DashboardFilter) -> DashboardMetrics {
    let filtered: Vec<&StudentAcademicRow> = rows.iter().filter(|row| filter.matches(row)).collect();

    let mut subjects: BTreeMap<Subject, AggregateBucket> = BTreeMap::new();
    let mut students: BTreeMap<String, AggregateBucket> = BTreeMap::new();
    let mut terms: BTreeMap<i32, AggregateBucket> = BTreeMap::new();
    let mut levels: BTreeMap<String, AggregateBucket> = BTreeMap::new();
    let mut groups: BTreeMap<String, AggregateBucket> = BTreeMap::new();

    for (position, row) in filtered.iter().enumerate() {
        for subject in Subject::ALL {
            if let Some(score) = row.scores.raw(subject).and_then(parse_score) {
                subjects.entry(subject).or_default().add(score);
            }
        }

        let Some(average) = row_average(row) else {
            continue;
        };
        students.entry(student_key(row, position)).or_default().add(average);
        terms.entry(row.term).or_default().add(average);
        levels.entry(row.level.clone()).or_default().add(average);
        groups.entry(row.group.clone()).or_default().add(average);
    }

    let subject_averages: Vec<SubjectAverage> = Subject::ALL
        .iter()
        .map(|&subject| {
            let bucket = subjects.get(&subject).copied().unwrap_or_default();
            SubjectAverage {
                subject,
                average: bucket.average(),
                count: bucket.count,
            }
        })
        .collect();

    let term_averages: Vec<TermAverage> = terms
        .iter()
        .filter_map(|(&term, bucket)| {
            bucket.average().map(|average| TermAverage {
                term,
                average,
                count: bucket.count,
            })
        })
        .collect();

    let student_averages: Vec<f64> = students.values().filter_map(AggregateBucket::average).collect();
    let passing = student_averages
        .iter()
        .filter(|&&average| average >= PASSING_AVERAGE)
        .count();
    let pass_rate = if student_averages.is_empty() {
        None
    } else {
        Some(passing as f64 / student_averages.len() as f64)
    };

    let trend = match term_averages.as_slice() {
        [.., previous, latest] => Some(latest.average - previous.average),
        _ => None,
    };

    DashboardMetrics {
        row_count: filtered.len(),
        total_students: student_averages.len(),
        global_average: mean(&student_averages),
        pass_rate,
        best_subject: extreme_subject(&subject_averages, |candidate, current| candidate > current),
        worst_subject: extreme_subject(&subject_averages, |candidate, current| candidate < current),
        subject_averages,
        term_averages,
        level_averages: ranked(&levels),
        group_averages: ranked(&groups),
        trend,
        last_updated: filtered.iter().filter_map(|row| row.created_at).max(),
    }
}

/// Sorted by average, highest first; equal averages keep ascending key order.
fn ranked(buckets: &BTreeMap<String, AggregateBucket>) -> Vec<KeyedAverage> {
    let mut values: Vec<KeyedAverage> = buckets
        .iter()
        .filter_map(|(key, bucket)| {
            bucket.average().map(|average| KeyedAverage {
                key: key.clone(),
                average,
                count: bucket.count,
            })
        })
        .collect();
    values.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(std::cmp::Ordering::Equal));
    values
}

/// Only a strict improvement replaces the current pick, so ties go to the
/// subject that comes first in the fixed order.
fn extreme_subject(averages: &[SubjectAverage], better: impl Fn(f64, f64) -> bool) -> Option<Subject> {
    let mut pick: Option<(Subject, f64)> = None;
    for entry in averages {
        let Some(average) = entry.average else {
            continue;
        };
        match pick {
            Some((_, current)) if !better(average, current) => {}
            _ => pick = Some((entry.subject, average)),
        }
    }
    pick.map(|(subject, _)| subject)
}

pub fn filter_options(rows: &[StudentAcademicRow]) -> FilterOptions {
    let mut years = BTreeSet::new();
    let mut levels = BTreeSet::new();
    let mut groups = BTreeSet::new();
    for row in rows {
        years.insert(row.academic_year.clone());
        levels.insert(row.level.clone());
        groups.insert(row.group.clone());
    }

    FilterOptions {
        academic_years: years.into_iter().collect(),
        levels: levels.into_iter().collect(),
        groups: groups.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubjectScores;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn row(name: &str, term: i32, catalan: &str, mathematics: &str) -> StudentAcademicRow {
        let mut scores = SubjectScores::default();
        scores.set(Subject::Catalan, catalan);
        scores.set(Subject::Mathematics, mathematics);
        StudentAcademicRow {
            id: None,
            student_id: None,
            student_name: Some(name.to_string()),
            academic_year: "2025-2026".to_string(),
            level: "1 ESO".to_string(),
            group: "A".to_string(),
            term,
            scores,
            created_at: None,
        }
    }

    fn sample_rows() -> Vec<StudentAcademicRow> {
        vec![
            row("Aina Puig", 1, "8", "6"),
            row("Biel Soler", 1, "4", "4"),
            row("Aina Puig", 2, "9", "9"),
        ]
    }

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.map_or(false, |value| (value - expected).abs() < 1e-9)
    }

    #[test]
    fn term_averages_and_trend() {
        let metrics = compute_dashboard(&sample_rows(), &DashboardFilter::default());
        assert_eq!(metrics.term_averages.len(), 2);
        assert_eq!(metrics.term_averages[0].term, 1);
        assert!((metrics.term_averages[0].average - 5.5).abs() < 1e-9);
        assert_eq!(metrics.term_averages[1].term, 2);
        assert!((metrics.term_averages[1].average - 9.0).abs() < 1e-9);
        assert!(close(metrics.trend, 3.5));
    }

    #[test]
    fn subject_averages_use_every_row() {
        let metrics = compute_dashboard(&sample_rows(), &DashboardFilter::default());
        let catalan = &metrics.subject_averages[0];
        assert_eq!(catalan.subject, Subject::Catalan);
        assert!(close(catalan.average, 7.0));
        let mathematics = &metrics.subject_averages[2];
        assert_eq!(mathematics.subject, Subject::Mathematics);
        assert!(close(mathematics.average, 19.0 / 3.0));
        assert_eq!(metrics.subject_averages[1].average, None);
        assert_eq!(metrics.subject_averages[1].count, 0);
        assert_eq!(metrics.best_subject, Some(Subject::Catalan));
        assert_eq!(metrics.worst_subject, Some(Subject::Mathematics));
    }

    #[test]
    fn students_are_counted_once_across_terms() {
        let metrics = compute_dashboard(&sample_rows(), &DashboardFilter::default());
        assert_eq!(metrics.total_students, 2);
        // Aina: mean(7, 9) = 8, Biel: 4
        assert!(close(metrics.global_average, 6.0));
        assert!(close(metrics.pass_rate, 0.5));
    }

    #[test]
    fn empty_input_yields_empty_metrics() {
        let metrics = compute_dashboard(&[], &DashboardFilter::default());
        assert_eq!(metrics.row_count, 0);
        assert_eq!(metrics.total_students, 0);
        assert_eq!(metrics.global_average, None);
        assert_eq!(metrics.pass_rate, None);
        assert_eq!(metrics.trend, None);
        assert_eq!(metrics.best_subject, None);
        assert_eq!(metrics.worst_subject, None);
        assert_eq!(metrics.last_updated, None);
        assert!(metrics.term_averages.is_empty());
        assert!(metrics.level_averages.is_empty());
        assert!(metrics.subject_averages.iter().all(|entry| entry.average.is_none()));
    }

    #[test]
    fn unparseable_scores_are_missing_not_zero() {
        let rows = vec![row("Carla Vidal", 1, "7,5", "pending"), row("Dani Roca", 1, "", "")];
        let metrics = compute_dashboard(&rows, &DashboardFilter::default());
        assert_eq!(metrics.row_count, 2);
        assert_eq!(metrics.total_students, 1);
        assert!(close(metrics.global_average, 7.5));
        assert_eq!(metrics.subject_averages[2].count, 0);
        assert!(close(metrics.subject_averages[0].average, 7.5));
    }

    #[test]
    fn filters_narrow_rows() {
        let mut rows = sample_rows();
        let mut other = row("Eric Mas", 1, "2", "2");
        other.group = "B".to_string();
        other.level = "2 ESO".to_string();
        rows.push(other);

        let filter = DashboardFilter {
            group: "B".parse().unwrap(),
            ..DashboardFilter::default()
        };
        let metrics = compute_dashboard(&rows, &filter);
        assert_eq!(metrics.row_count, 1);
        assert_eq!(metrics.total_students, 1);
        assert!(close(metrics.pass_rate, 0.0));
        assert_eq!(metrics.group_averages.len(), 1);
        assert_eq!(metrics.group_averages[0].key, "B");
    }

    #[test]
    fn level_and_group_rankings_are_descending() {
        let mut rows = sample_rows();
        let mut strong = row("Eric Mas", 1, "10", "10");
        strong.level = "2 ESO".to_string();
        strong.group = "B".to_string();
        rows.push(strong);
        let mut tied = row("Fina Camps", 1, "10", "10");
        tied.level = "0 Batx".to_string();
        tied.group = "C".to_string();
        rows.push(tied);

        let metrics = compute_dashboard(&rows, &DashboardFilter::default());
        let levels: Vec<&str> = metrics.level_averages.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(levels, vec!["0 Batx", "2 ESO", "1 ESO"]);
        let groups: Vec<&str> = metrics.group_averages.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(groups, vec!["B", "C", "A"]);
    }

    #[test]
    fn student_identity_falls_back_in_order() {
        let id = Uuid::new_v4();
        let mut by_id_a = row("Named Once", 1, "6", "6");
        by_id_a.student_id = Some(id);
        let mut by_id_b = row("Renamed", 2, "8", "8");
        by_id_b.student_id = Some(id);

        let row_id = Uuid::new_v4();
        let mut by_row = row("", 1, "3", "3");
        by_row.id = Some(row_id);

        let mut anonymous_a = row("", 1, "5", "5");
        anonymous_a.student_name = None;
        let mut anonymous_b = row("", 1, "5", "5");
        anonymous_b.student_name = None;

        let rows = vec![by_id_a, by_id_b, by_row, anonymous_a, anonymous_b];
        let metrics = compute_dashboard(&rows, &DashboardFilter::default());
        // one by id, one by row id, two anonymous rows each on their own
        assert_eq!(metrics.total_students, 4);
        assert!(close(metrics.pass_rate, 0.75));
    }

    #[test]
    fn best_and_worst_ties_go_to_first_subject() {
        let rows = vec![row("Gal Pons", 1, "7", "7")];
        let metrics = compute_dashboard(&rows, &DashboardFilter::default());
        assert_eq!(metrics.best_subject, Some(Subject::Catalan));
        assert_eq!(metrics.worst_subject, Some(Subject::Catalan));
    }

    #[test]
    fn single_term_has_no_trend() {
        let rows = vec![row("Gal Pons", 3, "7", "7")];
        let metrics = compute_dashboard(&rows, &DashboardFilter::default());
        assert_eq!(metrics.trend, None);
    }

    #[test]
    fn last_updated_is_latest_kept_timestamp() {
        let mut rows = sample_rows();
        rows[0].created_at = Some(Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap());
        rows[2].created_at = Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap());
        let metrics = compute_dashboard(&rows, &DashboardFilter::default());
        assert_eq!(
            metrics.last_updated,
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn all_filter_parses_case_insensitively() {
        assert_eq!("ALL".parse::<DimensionFilter>().unwrap(), DimensionFilter::All);
        assert_eq!("".parse::<DimensionFilter>().unwrap(), DimensionFilter::All);
        assert_eq!(
            " 3 ESO ".parse::<DimensionFilter>().unwrap(),
            DimensionFilter::Only("3 ESO".to_string())
        );
    }

    #[test]
    fn filter_options_are_distinct_and_sorted() {
        let mut rows = sample_rows();
        let mut other = row("Eric Mas", 1, "2", "2");
        other.academic_year = "2024-2025".to_string();
        other.group = "B".to_string();
        rows.push(other);
        let options = filter_options(&rows);
        assert_eq!(options.academic_years, vec!["2024-2025", "2025-2026"]);
        assert_eq!(options.levels, vec!["1 ESO"]);
        assert_eq!(options.groups, vec!["A", "B"]);
    }

    fn arb_row() -> impl Strategy<Value = StudentAcademicRow> {
        (
            prop_oneof![Just("Aina"), Just("Biel"), Just("Carla"), Just("")],
            1i32..=3,
            prop_oneof![Just("2024-2025"), Just("2025-2026")],
            prop_oneof![Just("1 ESO"), Just("2 ESO")],
            prop_oneof![Just("A"), Just("B")],
            proptest::option::of(0u32..=100),
            proptest::option::of(0u32..=100),
        )
            .prop_map(|(name, term, year, level, group, catalan, mathematics)| {
                let mut scores = SubjectScores::default();
                if let Some(value) = catalan {
                    scores.set(Subject::Catalan, format!("{},{}", value / 10, value % 10));
                }
                if let Some(value) = mathematics {
                    scores.set(Subject::Mathematics, format!("{}.{}", value / 10, value % 10));
                }
                StudentAcademicRow {
                    id: None,
                    student_id: None,
                    student_name: Some(name.to_string()),
                    academic_year: year.to_string(),
                    level: level.to_string(),
                    group: group.to_string(),
                    term,
                    scores,
                    created_at: None,
                }
            })
    }

    proptest! {
        #[test]
        fn repeated_runs_are_identical(rows in proptest::collection::vec(arb_row(), 0..30)) {
            let filter = DashboardFilter::default();
            let first = compute_dashboard(&rows, &filter);
            let second = compute_dashboard(&rows, &filter);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn filtering_matches_prefiltered_input(rows in proptest::collection::vec(arb_row(), 0..30)) {
            let filter = DashboardFilter {
                level: DimensionFilter::Only("2 ESO".to_string()),
                ..DashboardFilter::default()
            };
            let prefiltered: Vec<StudentAcademicRow> = rows
                .iter()
                .filter(|row| row.level == "2 ESO")
                .cloned()
                .collect();
            let filtered = compute_dashboard(&rows, &filter);
            let direct = compute_dashboard(&prefiltered, &DashboardFilter::default());
            prop_assert_eq!(filtered.level_averages, direct.level_averages);
            prop_assert_eq!(filtered.group_averages, direct.group_averages);
            prop_assert_eq!(filtered.term_averages, direct.term_averages);
            prop_assert_eq!(filtered.subject_averages, direct.subject_averages);
        }
    }
}
