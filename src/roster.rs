//! Student lookups that run over already-fetched rosters.

use anyhow::bail;
use uuid::Uuid;

use crate::models::StudentRecord;

pub const MIN_QUERY_LEN: usize = 2;
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Case-insensitive substring match on "first last". Queries shorter than
/// two characters (after trimming) match nothing.
pub fn search_students<'a>(students: &'a [StudentRecord], query: &str) -> Vec<&'a StudentRecord> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return Vec::new();
    }

    let needle = query.to_lowercase();
    students
        .iter()
        .filter(|student| student.full_name().to_lowercase().contains(&needle))
        .take(MAX_SEARCH_RESULTS)
        .collect()
}

/// Status rows may only be written for students of the owning class.
pub fn ensure_same_class(student: &StudentRecord, class_id: Uuid) -> anyhow::Result<()> {
    if student.class_id != class_id {
        bail!(
            "{} ({}) is not enrolled in this class",
            student.full_name(),
            student.id
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(class_id: Uuid, first_name: &str, last_name: &str) -> StudentRecord {
        StudentRecord {
            id: Uuid::new_v4(),
            class_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: None,
            active: true,
        }
    }

    #[test]
    fn matches_across_first_and_last_name() {
        let class_id = Uuid::new_v4();
        let students = vec![
            student(class_id, "Aina", "Puig"),
            student(class_id, "Biel", "Soler"),
            student(class_id, "Carla", "Vidal"),
        ];

        let found = search_students(&students, "a pu");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "Aina");

        let found = search_students(&students, "  LE ");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_name, "Soler");
    }

    #[test]
    fn short_queries_match_nothing() {
        let students = vec![student(Uuid::new_v4(), "Aina", "Puig")];
        assert!(search_students(&students, "a").is_empty());
        assert!(search_students(&students, " ").is_empty());
    }

    #[test]
    fn results_are_capped() {
        let class_id = Uuid::new_v4();
        let students: Vec<StudentRecord> = (0..15)
            .map(|n| student(class_id, "Pol", &format!("Serra {n}")))
            .collect();
        let found = search_students(&students, "pol");
        assert_eq!(found.len(), MAX_SEARCH_RESULTS);
        assert_eq!(found[0].last_name, "Serra 0");
    }

    #[test]
    fn rejects_students_from_another_class() {
        let class_id = Uuid::new_v4();
        let own = student(class_id, "Aina", "Puig");
        let other = student(Uuid::new_v4(), "Biel", "Soler");
        assert!(ensure_same_class(&own, class_id).is_ok());
        let err = ensure_same_class(&other, class_id).unwrap_err();
        assert!(err.to_string().contains("Biel Soler"));
    }
}
