use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::grades::GradeCategory;
use crate::excursions::ExcursionField;
use crate::models::{
    ClassRecord, ExcursionRecord, ExcursionStatus, GradeRecord, HomeworkRecord, HomeworkStatus,
    StudentAcademicRow, StudentRecord, Subject, SubjectScores,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

type SeedGrade = (usize, f64, GradeCategory, (i32, u32, u32));

const SEED_CLASS: &str = "1 ESO A";

const SEED_STUDENTS: [(&str, &str, &str); 3] = [
    ("Aina", "Puig", "aina.puig@escola.cat"),
    ("Biel", "Soler", "biel.soler@escola.cat"),
    ("Carla", "Vidal", "carla.vidal@escola.cat"),
];

/// Grades reference `SEED_STUDENTS` by position.
const SEED_GRADES: [SeedGrade; 6] = [
    (0, 6.0, GradeCategory::Exam, (2025, 10, 14)),
    (0, 8.0, GradeCategory::Exam, (2025, 11, 20)),
    (0, 10.0, GradeCategory::Homework, (2025, 11, 3)),
    (1, 4.5, GradeCategory::Exam, (2025, 10, 14)),
    (1, 7.0, GradeCategory::Activity, (2025, 10, 28)),
    (2, 9.0, GradeCategory::Exam, (2025, 11, 20)),
];

/// Source key, student position, term, scores in `Subject::ALL` order.
const SEED_RECORDS: [(&str, usize, i32, [&str; 6]); 6] = [
    ("seed-001", 0, 1, ["8", "7,5", "6", "7", "8", "6,5"]),
    ("seed-002", 1, 1, ["4", "5", "4", "3,5", "5", "4"]),
    ("seed-003", 2, 1, ["9", "8,5", "9,5", "9", "8", "9"]),
    ("seed-004", 0, 2, ["9", "8", "9", "8", "8,5", "7"]),
    ("seed-005", 1, 2, ["5", "5,5", "4,5", "", "6", "5"]),
    ("seed-006", 2, 2, ["9,5", "9", "10", "9", "9", "9,5"]),
];

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let class_id = create_class(pool, SEED_CLASS).await?;

    // Re-seeding keeps whatever id the email already has.
    let mut student_ids = Vec::with_capacity(SEED_STUDENTS.len());
    for (first_name, last_name, email) in SEED_STUDENTS {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO classroom_dashboard.students (id, class_id, first_name, last_name, email)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
            SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(class_id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .fetch_one(pool)
        .await?
        .get("id");
        student_ids.push(id);
    }

    sqlx::query("DELETE FROM classroom_dashboard.grades WHERE student_id = ANY($1)")
        .bind(student_ids.as_slice())
        .execute(pool)
        .await?;

    for (student, value, category, (year, month, day)) in SEED_GRADES {
        let date = NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?;
        insert_grade(pool, student_ids[student], value, category, Some(date)).await?;
    }

    for (source_key, student, term, scores) in SEED_RECORDS {
        let (first_name, last_name, _) = SEED_STUDENTS[student];
        let mut subject_scores = SubjectScores::default();
        for (subject, raw) in Subject::ALL.iter().zip(scores) {
            if !raw.is_empty() {
                subject_scores.set(*subject, raw);
            }
        }

        insert_academic_record(
            pool,
            &AcademicRecordInput {
                student_id: Some(student_ids[student]),
                student_name: Some(format!("{first_name} {last_name}")),
                academic_year: "2025-2026".to_string(),
                level: "1 ESO".to_string(),
                group: "A".to_string(),
                term,
                scores: subject_scores,
                source_key: source_key.to_string(),
            },
        )
        .await?;
    }

    info!(class_id = %class_id, students = student_ids.len(), "seed data inserted");
    Ok(())
}

pub struct AcademicRecordInput {
    pub student_id: Option<Uuid>,
    pub student_name: Option<String>,
    pub academic_year: String,
    pub level: String,
    pub group: String,
    pub term: i32,
    pub scores: SubjectScores,
    pub source_key: String,
}

/// Returns `true` when a row was inserted, `false` when the source key was
/// already present.
pub async fn insert_academic_record(
    pool: &PgPool,
    record: &AcademicRecordInput,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.academic_records
        (id, student_id, student_name, academic_year, level, group_name, term,
         catalan, spanish, mathematics, english, social_science, natural_science, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(record.student_id)
    .bind(record.student_name.as_deref())
    .bind(&record.academic_year)
    .bind(&record.level)
    .bind(&record.group)
    .bind(record.term)
    .bind(record.scores.raw(Subject::Catalan))
    .bind(record.scores.raw(Subject::Spanish))
    .bind(record.scores.raw(Subject::Mathematics))
    .bind(record.scores.raw(Subject::English))
    .bind(record.scores.raw(Subject::SocialScience))
    .bind(record.scores.raw(Subject::NaturalScience))
    .bind(&record.source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_academic_rows(pool: &PgPool) -> anyhow::Result<Vec<StudentAcademicRow>> {
    let records = sqlx::query(
        "SELECT id, student_id, student_name, academic_year, level, group_name, term, \
         catalan, spanish, mathematics, english, social_science, natural_science, created_at \
         FROM classroom_dashboard.academic_records \
         ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    let mut rows = Vec::with_capacity(records.len());
    for row in records {
        rows.push(StudentAcademicRow {
            id: row.get("id"),
            student_id: row.get("student_id"),
            student_name: row.get("student_name"),
            academic_year: row.get("academic_year"),
            level: row.get("level"),
            group: row.get("group_name"),
            term: row.get("term"),
            scores: SubjectScores {
                catalan: row.get("catalan"),
                spanish: row.get("spanish"),
                mathematics: row.get("mathematics"),
                english: row.get("english"),
                social_science: row.get("social_science"),
                natural_science: row.get("natural_science"),
            },
            created_at: row.get("created_at"),
        });
    }

    debug!(rows = rows.len(), "fetched academic records");
    Ok(rows)
}

/// One line of an academic records CSV. Empty cells deserialize to `None`.
#[derive(Debug, serde::Deserialize)]
pub struct AcademicCsvRow {
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub academic_year: String,
    pub level: String,
    pub group: String,
    pub term: i32,
    pub catalan: Option<String>,
    pub spanish: Option<String>,
    pub mathematics: Option<String>,
    pub english: Option<String>,
    pub social_science: Option<String>,
    pub natural_science: Option<String>,
    pub source_key: Option<String>,
}

impl AcademicCsvRow {
    pub fn email(&self) -> Option<&str> {
        self.student_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Rows without a source key get a fresh `import-<uuid>` key, so they
    /// are never deduplicated.
    pub fn into_input(self, student_id: Option<Uuid>) -> AcademicRecordInput {
        AcademicRecordInput {
            student_id,
            student_name: self.student_name,
            academic_year: self.academic_year,
            level: self.level,
            group: self.group,
            term: self.term,
            scores: SubjectScores {
                catalan: self.catalan,
                spanish: self.spanish,
                mathematics: self.mathematics,
                english: self.english,
                social_science: self.social_science,
                natural_science: self.natural_science,
            },
            source_key: self
                .source_key
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4())),
        }
    }
}

pub fn read_academic_csv<R: std::io::Read>(input: R) -> anyhow::Result<Vec<AcademicCsvRow>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<AcademicCsvRow>().enumerate() {
        rows.push(result.with_context(|| format!("invalid record on data line {}", line + 1))?);
    }
    Ok(rows)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_academic_csv(file)?;
    let mut inserted = 0usize;

    for row in rows {
        let student_id: Option<Uuid> = match row.email() {
            Some(email) => sqlx::query("SELECT id FROM classroom_dashboard.students WHERE email = $1")
                .bind(email)
                .fetch_optional(pool)
                .await?
                .map(|found| found.get("id")),
            None => None,
        };

        if insert_academic_record(pool, &row.into_input(student_id)).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn create_class(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.classes (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

pub async fn find_class(pool: &PgPool, name: &str) -> anyhow::Result<Option<ClassRecord>> {
    let row = sqlx::query("SELECT id, name FROM classroom_dashboard.classes WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| ClassRecord {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

pub async fn fetch_classes(pool: &PgPool) -> anyhow::Result<Vec<ClassRecord>> {
    let rows = sqlx::query("SELECT id, name FROM classroom_dashboard.classes ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| ClassRecord {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

/// Removes the class with its students, grades, homework and excursions.
pub async fn delete_class(pool: &PgPool, class_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM classroom_dashboard.classes WHERE id = $1")
        .bind(class_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn create_student(
    pool: &PgPool,
    class_id: Uuid,
    first_name: &str,
    last_name: &str,
    email: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.students (id, class_id, first_name, last_name, email)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(class_id)
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(id)
}

fn student_from_row(row: &sqlx::postgres::PgRow) -> StudentRecord {
    StudentRecord {
        id: row.get("id"),
        class_id: row.get("class_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        active: row.get("is_active"),
    }
}

pub async fn fetch_student(pool: &PgPool, student_id: Uuid) -> anyhow::Result<Option<StudentRecord>> {
    let row = sqlx::query(
        "SELECT id, class_id, first_name, last_name, email, is_active \
         FROM classroom_dashboard.students WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(student_from_row))
}

pub async fn fetch_active_students(pool: &PgPool, class_id: Uuid) -> anyhow::Result<Vec<StudentRecord>> {
    let rows = sqlx::query(
        "SELECT id, class_id, first_name, last_name, email, is_active \
         FROM classroom_dashboard.students \
         WHERE class_id = $1 AND is_active \
         ORDER BY last_name, first_name",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

pub async fn fetch_all_active_students(pool: &PgPool) -> anyhow::Result<Vec<StudentRecord>> {
    let rows = sqlx::query(
        "SELECT id, class_id, first_name, last_name, email, is_active \
         FROM classroom_dashboard.students \
         WHERE is_active \
         ORDER BY last_name, first_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

/// `None` fields keep their stored value. Returns `false` if no such student.
pub async fn update_student(
    pool: &PgPool,
    student_id: Uuid,
    first_name: Option<&str>,
    last_name: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE classroom_dashboard.students
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            email = COALESCE($4, email)
        WHERE id = $1
        "#,
    )
    .bind(student_id)
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_student_active(pool: &PgPool, student_id: Uuid, active: bool) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE classroom_dashboard.students SET is_active = $2 WHERE id = $1")
        .bind(student_id)
        .bind(active)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Grades and status rows go with the student; academic records keep the
/// name and lose the link.
pub async fn delete_student(pool: &PgPool, student_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM classroom_dashboard.students WHERE id = $1")
        .bind(student_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_grade(
    pool: &PgPool,
    student_id: Uuid,
    value: f64,
    category: GradeCategory,
    date: Option<NaiveDate>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.grades (id, student_id, value, grade_type, date)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(student_id)
    .bind(value)
    .bind(category.as_str())
    .bind(date)
    .execute(pool)
    .await?;

    Ok(id)
}

/// `date: None` keeps the stored date.
pub async fn update_grade(
    pool: &PgPool,
    grade_id: Uuid,
    value: f64,
    category: GradeCategory,
    date: Option<NaiveDate>,
) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query(
        r#"
        UPDATE classroom_dashboard.grades
        SET value = $2, grade_type = $3, date = COALESCE($4, date)
        WHERE id = $1
        RETURNING student_id
        "#,
    )
    .bind(grade_id)
    .bind(value)
    .bind(category.as_str())
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| row.get("student_id")))
}

/// Returns the owning student's id, or `None` if the grade did not exist.
pub async fn delete_grade(pool: &PgPool, grade_id: Uuid) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query("DELETE FROM classroom_dashboard.grades WHERE id = $1 RETURNING student_id")
        .bind(grade_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get("student_id")))
}

fn grade_from_row(row: &sqlx::postgres::PgRow) -> GradeRecord {
    GradeRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        value: row.get("value"),
        category: row.get("grade_type"),
        date: row.get("date"),
    }
}

pub async fn fetch_grades_for_student(pool: &PgPool, student_id: Uuid) -> anyhow::Result<Vec<GradeRecord>> {
    let rows = sqlx::query(
        "SELECT id, student_id, value, grade_type, date \
         FROM classroom_dashboard.grades \
         WHERE student_id = $1 \
         ORDER BY date DESC NULLS LAST",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(grade_from_row).collect())
}

pub async fn fetch_grades_for_class(pool: &PgPool, class_id: Uuid) -> anyhow::Result<Vec<GradeRecord>> {
    let rows = sqlx::query(
        "SELECT g.id, g.student_id, g.value, g.grade_type, g.date \
         FROM classroom_dashboard.grades g \
         JOIN classroom_dashboard.students s ON s.id = g.student_id \
         WHERE s.class_id = $1",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(grade_from_row).collect())
}

/// Creates the homework and a pending status row for every active student of
/// the class.
pub async fn create_homework(
    pool: &PgPool,
    class_id: Uuid,
    title: &str,
    subject: Option<&str>,
    due_date: NaiveDate,
    description: Option<&str>,
) -> anyhow::Result<(Uuid, u64)> {
    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.homeworks (id, class_id, title, subject, due_date, description)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(class_id)
    .bind(title)
    .bind(subject)
    .bind(due_date)
    .bind(description)
    .execute(&mut *tx)
    .await?;

    let statuses = sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.homework_status (homework_id, student_id, delivered)
        SELECT $1, id, FALSE
        FROM classroom_dashboard.students
        WHERE class_id = $2 AND is_active
        "#,
    )
    .bind(id)
    .bind(class_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((id, statuses.rows_affected()))
}

pub async fn fetch_homework(pool: &PgPool, homework_id: Uuid) -> anyhow::Result<Option<HomeworkRecord>> {
    let row = sqlx::query(
        "SELECT id, class_id, title, subject, due_date \
         FROM classroom_dashboard.homeworks WHERE id = $1",
    )
    .bind(homework_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| HomeworkRecord {
        id: row.get("id"),
        class_id: row.get("class_id"),
        title: row.get("title"),
        subject: row.get("subject"),
        due_date: row.get("due_date"),
    }))
}

/// Upserts one student's status. `None` leaves the stored value untouched.
pub async fn set_homework_status(
    pool: &PgPool,
    homework_id: Uuid,
    student_id: Uuid,
    delivered: Option<bool>,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.homework_status AS hs
        (homework_id, student_id, delivered, comment, updated_at)
        VALUES ($1, $2, COALESCE($3, FALSE), $4, now())
        ON CONFLICT (homework_id, student_id) DO UPDATE
        SET delivered = COALESCE($3, hs.delivered),
            comment = COALESCE($4, hs.comment),
            updated_at = now()
        "#,
    )
    .bind(homework_id)
    .bind(student_id)
    .bind(delivered)
    .bind(comment)
    .execute(pool)
    .await?;

    Ok(())
}

/// Every active student of the homework's class; students without a status
/// row count as not delivered.
pub async fn fetch_homework_statuses(
    pool: &PgPool,
    homework: &HomeworkRecord,
) -> anyhow::Result<Vec<HomeworkStatus>> {
    let rows = sqlx::query(
        "SELECT s.id, s.first_name, s.last_name, \
         COALESCE(hs.delivered, FALSE) AS delivered, hs.comment \
         FROM classroom_dashboard.students s \
         LEFT JOIN classroom_dashboard.homework_status hs \
           ON hs.student_id = s.id AND hs.homework_id = $1 \
         WHERE s.class_id = $2 AND s.is_active \
         ORDER BY s.last_name, s.first_name",
    )
    .bind(homework.id)
    .bind(homework.class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let first_name: String = row.get("first_name");
            let last_name: String = row.get("last_name");
            HomeworkStatus {
                student_id: row.get("id"),
                student_name: format!("{first_name} {last_name}"),
                delivered: row.get("delivered"),
                comment: row.get("comment"),
            }
        })
        .collect())
}

/// Creates the excursion with an "absent, unpaid" row for every active
/// student of the class.
pub async fn create_excursion(
    pool: &PgPool,
    class_id: Uuid,
    title: &str,
    date: NaiveDate,
    price: Option<f64>,
) -> anyhow::Result<(Uuid, u64)> {
    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.excursions (id, class_id, title, date, price)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(class_id)
    .bind(title)
    .bind(date)
    .bind(price)
    .execute(&mut *tx)
    .await?;

    let statuses = sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.excursion_status (excursion_id, student_id, attends, paid)
        SELECT $1, id, FALSE, FALSE
        FROM classroom_dashboard.students
        WHERE class_id = $2 AND is_active
        "#,
    )
    .bind(id)
    .bind(class_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((id, statuses.rows_affected()))
}

pub async fn fetch_excursion(pool: &PgPool, excursion_id: Uuid) -> anyhow::Result<Option<ExcursionRecord>> {
    let row = sqlx::query(
        "SELECT id, class_id, title, date, price \
         FROM classroom_dashboard.excursions WHERE id = $1",
    )
    .bind(excursion_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| ExcursionRecord {
        id: row.get("id"),
        class_id: row.get("class_id"),
        title: row.get("title"),
        date: row.get("date"),
        price: row.get("price"),
    }))
}

pub async fn delete_excursion(pool: &PgPool, excursion_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM classroom_dashboard.excursions WHERE id = $1")
        .bind(excursion_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Upserts one student's status. `None` leaves the stored value untouched.
pub async fn set_excursion_status(
    pool: &PgPool,
    excursion_id: Uuid,
    student_id: Uuid,
    attends: Option<bool>,
    paid: Option<bool>,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO classroom_dashboard.excursion_status AS es
        (excursion_id, student_id, attends, paid, comment, updated_at)
        VALUES ($1, $2, COALESCE($3, FALSE), COALESCE($4, FALSE), $5, now())
        ON CONFLICT (excursion_id, student_id) DO UPDATE
        SET attends = COALESCE($3, es.attends),
            paid = COALESCE($4, es.paid),
            comment = COALESCE($5, es.comment),
            updated_at = now()
        "#,
    )
    .bind(excursion_id)
    .bind(student_id)
    .bind(attends)
    .bind(paid)
    .bind(comment)
    .execute(pool)
    .await?;

    Ok(())
}

/// Sets one flag for every active student of the excursion's class, creating
/// missing status rows.
pub async fn mark_all_excursion(
    pool: &PgPool,
    excursion: &ExcursionRecord,
    field: ExcursionField,
    value: bool,
) -> anyhow::Result<u64> {
    let column = field.column();
    let statement = format!(
        "INSERT INTO classroom_dashboard.excursion_status \
         (excursion_id, student_id, {column}, updated_at) \
         SELECT $1, id, $3, now() \
         FROM classroom_dashboard.students \
         WHERE class_id = $2 AND is_active \
         ON CONFLICT (excursion_id, student_id) DO UPDATE \
         SET {column} = EXCLUDED.{column}, updated_at = now()"
    );

    let result = sqlx::query(&statement)
        .bind(excursion.id)
        .bind(excursion.class_id)
        .bind(value)
        .execute(pool)
        .await?;

    debug!(excursion_id = %excursion.id, %field, value, rows = result.rows_affected(), "marked all");
    Ok(result.rows_affected())
}

/// Every active student of the excursion's class; students without a status
/// row count as absent and unpaid.
pub async fn fetch_excursion_statuses(
    pool: &PgPool,
    excursion: &ExcursionRecord,
) -> anyhow::Result<Vec<ExcursionStatus>> {
    let rows = sqlx::query(
        "SELECT s.id, s.first_name, s.last_name, \
         COALESCE(es.attends, FALSE) AS attends, COALESCE(es.paid, FALSE) AS paid, es.comment \
         FROM classroom_dashboard.students s \
         LEFT JOIN classroom_dashboard.excursion_status es \
           ON es.student_id = s.id AND es.excursion_id = $1 \
         WHERE s.class_id = $2 AND s.is_active \
         ORDER BY s.last_name, s.first_name",
    )
    .bind(excursion.id)
    .bind(excursion.class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let first_name: String = row.get("first_name");
            let last_name: String = row.get("last_name");
            ExcursionStatus {
                student_id: row.get("id"),
                student_name: format!("{first_name} {last_name}"),
                attends: row.get("attends"),
                paid: row.get("paid"),
                comment: row.get("comment"),
            }
        })
        .collect())
}
