use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: Uuid,
    pub class_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub active: bool,
}

impl StudentRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A single graded item as stored. `category` keeps the stored label so that
/// rows with labels outside the known set still load.
#[derive(Debug, Clone)]
pub struct GradeRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub value: f64,
    pub category: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Catalan,
    Spanish,
    Mathematics,
    English,
    SocialScience,
    NaturalScience,
}

impl Subject {
    /// Fixed dashboard order. Tie-breaks and output order follow it.
    pub const ALL: [Subject; 6] = [
        Subject::Catalan,
        Subject::Spanish,
        Subject::Mathematics,
        Subject::English,
        Subject::SocialScience,
        Subject::NaturalScience,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Subject::Catalan => "Catalan",
            Subject::Spanish => "Spanish",
            Subject::Mathematics => "Mathematics",
            Subject::English => "English",
            Subject::SocialScience => "Social Science",
            Subject::NaturalScience => "Natural Science",
        }
    }
}

/// Raw per-subject scores, kept as text the way they were imported.
#[derive(Debug, Clone, Default)]
pub struct SubjectScores {
    pub catalan: Option<String>,
    pub spanish: Option<String>,
    pub mathematics: Option<String>,
    pub english: Option<String>,
    pub social_science: Option<String>,
    pub natural_science: Option<String>,
}

impl SubjectScores {
    pub fn raw(&self, subject: Subject) -> Option<&str> {
        let value = match subject {
            Subject::Catalan => &self.catalan,
            Subject::Spanish => &self.spanish,
            Subject::Mathematics => &self.mathematics,
            Subject::English => &self.english,
            Subject::SocialScience => &self.social_science,
            Subject::NaturalScience => &self.natural_science,
        };
        value.as_deref()
    }

    pub fn set(&mut self, subject: Subject, raw: impl Into<String>) {
        let slot = match subject {
            Subject::Catalan => &mut self.catalan,
            Subject::Spanish => &mut self.spanish,
            Subject::Mathematics => &mut self.mathematics,
            Subject::English => &mut self.english,
            Subject::SocialScience => &mut self.social_science,
            Subject::NaturalScience => &mut self.natural_science,
        };
        *slot = Some(raw.into());
    }
}

#[derive(Debug, Clone)]
pub struct StudentAcademicRow {
    pub id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub student_name: Option<String>,
    pub academic_year: String,
    pub level: String,
    pub group: String,
    pub term: i32,
    pub scores: SubjectScores,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateBucket {
    pub sum: f64,
    pub count: usize,
}

impl AggregateBucket {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: Subject,
    pub average: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermAverage {
    pub term: i32,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyedAverage {
    pub key: String,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub row_count: usize,
    pub total_students: usize,
    pub global_average: Option<f64>,
    pub pass_rate: Option<f64>,
    pub subject_averages: Vec<SubjectAverage>,
    pub term_averages: Vec<TermAverage>,
    pub level_averages: Vec<KeyedAverage>,
    pub group_averages: Vec<KeyedAverage>,
    pub best_subject: Option<Subject>,
    pub worst_subject: Option<Subject>,
    pub trend: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub academic_years: Vec<String>,
    pub levels: Vec<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HomeworkRecord {
    pub id: Uuid,
    pub class_id: Uuid,
    pub title: String,
    pub subject: Option<String>,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct HomeworkStatus {
    pub student_id: Uuid,
    pub student_name: String,
    pub delivered: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    pub total: usize,
    pub delivered: usize,
    pub pending: usize,
    pub delivery_rate: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ExcursionRecord {
    pub id: Uuid,
    pub class_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub price: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ExcursionStatus {
    pub student_id: Uuid,
    pub student_name: String,
    pub attends: bool,
    pub paid: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcursionSummary {
    pub total: usize,
    pub attending: usize,
    pub paid: usize,
    /// Attending students who have not paid yet.
    pub outstanding: usize,
    pub attendance_rate: Option<f64>,
    pub collected: Option<f64>,
}
