use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::models::GradeRecord;
use crate::numeric::{mean, parse_score};

pub const MIN_GRADE: f64 = 0.0;
pub const MAX_GRADE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeCategory {
    Exam,
    Homework,
    Activity,
}

impl GradeCategory {
    pub const ALL: [GradeCategory; 3] = [
        GradeCategory::Exam,
        GradeCategory::Homework,
        GradeCategory::Activity,
    ];

    /// Share of the final grade, in percent.
    pub fn weight(self) -> f64 {
        match self {
            GradeCategory::Exam => 80.0,
            GradeCategory::Homework => 10.0,
            GradeCategory::Activity => 10.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GradeCategory::Exam => "exam",
            GradeCategory::Homework => "homework",
            GradeCategory::Activity => "activity",
        }
    }
}

/// Exact match on the stored label. Typed input is trimmed by
/// [`parse_grade_input`] before it gets here.
impl FromStr for GradeCategory {
    type Err = GradeInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exam" => Ok(GradeCategory::Exam),
            "homework" => Ok(GradeCategory::Homework),
            "activity" => Ok(GradeCategory::Activity),
            other => Err(GradeInputError::UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GradeInputError {
    #[error("grade value {0:?} is not a number")]
    NotANumber(String),
    #[error("grade {0} is outside the 0-10 range")]
    OutOfRange(f64),
    #[error("unknown grade category {0:?} (expected exam, homework or activity)")]
    UnknownCategory(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMean {
    pub category: GradeCategory,
    pub weight: f64,
    pub mean: f64,
    pub count: usize,
}

/// Per-category means for the categories that have at least one record,
/// in exam, homework, activity order. Unknown labels are skipped.
pub fn category_breakdown(grades: &[GradeRecord]) -> Vec<CategoryMean> {
    GradeCategory::ALL
        .iter()
        .filter_map(|&category| {
            let values: Vec<f64> = grades
                .iter()
                .filter(|grade| grade.category.parse::<GradeCategory>().ok() == Some(category))
                .map(|grade| grade.value)
                .collect();
            mean(&values).map(|mean| CategoryMean {
                category,
                weight: category.weight(),
                mean,
                count: values.len(),
            })
        })
        .collect()
}

/// Weighted average over the categories present. The denominator only counts
/// the weights of categories that have records, so a student with exams only
/// gets the plain exam mean.
pub fn weighted_average(grades: &[GradeRecord]) -> Option<f64> {
    let breakdown = category_breakdown(grades);
    let total_weight: f64 = breakdown.iter().map(|entry| entry.weight).sum();
    if total_weight == 0.0 {
        return None;
    }

    let weighted_sum: f64 = breakdown.iter().map(|entry| entry.mean * entry.weight).sum();
    Some(weighted_sum / total_weight)
}

/// Validates a grade as typed by a teacher before it is stored.
pub fn parse_grade_input(
    raw_value: &str,
    raw_category: &str,
) -> Result<(f64, GradeCategory), GradeInputError> {
    let value =
        parse_score(raw_value).ok_or_else(|| GradeInputError::NotANumber(raw_value.to_string()))?;
    if !(MIN_GRADE..=MAX_GRADE).contains(&value) {
        return Err(GradeInputError::OutOfRange(value));
    }
    let category = raw_category.trim().parse::<GradeCategory>()?;
    Ok((value, category))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn grade(category: &str, value: f64) -> GradeRecord {
        GradeRecord {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            value,
            category: category.to_string(),
            date: None,
        }
    }

    #[test]
    fn weights_present_categories_only() {
        let grades = vec![grade("exam", 6.0), grade("exam", 8.0), grade("homework", 10.0)];
        let average = weighted_average(&grades).unwrap();
        let expected = (7.0 * 80.0 + 10.0 * 10.0) / 90.0;
        assert!((average - expected).abs() < 1e-9);
        assert!((average - 7.3333).abs() < 0.001);
    }

    #[test]
    fn no_grades_means_no_average() {
        assert_eq!(weighted_average(&[]), None);
    }

    #[test]
    fn unknown_categories_are_ignored() {
        let grades = vec![grade("exam", 4.0), grade("project", 10.0)];
        assert_eq!(weighted_average(&grades), Some(4.0));
        assert_eq!(weighted_average(&[grade("project", 10.0)]), None);
    }

    #[test]
    fn stored_labels_must_match_exactly() {
        let grades = vec![grade("exam", 4.0), grade(" exam ", 10.0), grade("Exam", 10.0)];
        assert_eq!(weighted_average(&grades), Some(4.0));
        assert_eq!(category_breakdown(&grades)[0].count, 1);
        assert!(" exam ".parse::<GradeCategory>().is_err());
    }

    #[test]
    fn all_three_categories_use_full_weight() {
        let grades = vec![grade("exam", 5.0), grade("homework", 10.0), grade("activity", 0.0)];
        let average = weighted_average(&grades).unwrap();
        assert!((average - 5.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_reports_counts_in_category_order() {
        let grades = vec![grade("activity", 9.0), grade("exam", 6.0), grade("exam", 8.0)];
        let breakdown = category_breakdown(&grades);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, GradeCategory::Exam);
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[0].mean, 7.0);
        assert_eq!(breakdown[1].category, GradeCategory::Activity);
        assert_eq!(breakdown[1].weight, 10.0);
    }

    #[test]
    fn grade_input_validation() {
        assert_eq!(parse_grade_input("7,25", "exam"), Ok((7.25, GradeCategory::Exam)));
        assert_eq!(parse_grade_input("0", " activity "), Ok((0.0, GradeCategory::Activity)));
        assert_eq!(
            parse_grade_input("abc", "exam"),
            Err(GradeInputError::NotANumber("abc".to_string()))
        );
        assert_eq!(
            parse_grade_input("10.5", "exam"),
            Err(GradeInputError::OutOfRange(10.5))
        );
        assert_eq!(
            parse_grade_input("5", "quiz"),
            Err(GradeInputError::UnknownCategory("quiz".to_string()))
        );
    }

    proptest! {
        #[test]
        fn single_category_is_its_plain_mean(
            values in proptest::collection::vec(0.0f64..=10.0, 1..20),
            category in prop_oneof![Just("exam"), Just("homework"), Just("activity")],
        ) {
            let grades: Vec<GradeRecord> = values.iter().map(|&v| grade(category, v)).collect();
            let plain = values.iter().sum::<f64>() / values.len() as f64;
            let weighted = weighted_average(&grades).unwrap();
            prop_assert!((weighted - plain).abs() < 1e-9);
        }
    }
}
