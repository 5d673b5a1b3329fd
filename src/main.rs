use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use uuid::Uuid;

mod config;
mod dashboard;
mod db;
mod excursions;
mod grades;
mod homework;
mod logging;
mod models;
mod numeric;
mod relay;
mod report;
mod roster;

use crate::config::Config;
use crate::dashboard::{DashboardFilter, DimensionFilter};
use crate::excursions::ExcursionField;
use crate::relay::{Agent, RelayClient};

#[derive(Parser)]
#[command(name = "classroom-dashboard")]
#[command(about = "Grades, homework and academic dashboard for a school", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Academic year, e.g. 2025-2026
    #[arg(long, default_value = "all")]
    year: DimensionFilter,
    #[arg(long, default_value = "all")]
    level: DimensionFilter,
    #[arg(long, default_value = "all")]
    group: DimensionFilter,
}

impl From<FilterArgs> for DashboardFilter {
    fn from(args: FilterArgs) -> Self {
        DashboardFilter {
            academic_year: args.year,
            level: args.level,
            group: args.group,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import academic records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print dashboard metrics
    Dashboard {
        #[command(flatten)]
        filter: FilterArgs,
        /// Emit the metrics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown dashboard report
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Create a class (no-op if it already exists)
    AddClass {
        #[arg(long)]
        name: String,
    },
    /// Delete a class with its students, grades, homework and excursions
    DeleteClass {
        #[arg(long)]
        name: String,
    },
    /// Enrol a student in a class
    AddStudent {
        #[arg(long)]
        class: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Change a student's name or email
    UpdateStudent {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Activate or deactivate a student
    #[command(group(
        ArgGroup::new("state")
            .args(["active", "inactive"])
            .required(true)
            .multiple(false)
    ))]
    SetStudentActive {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        active: bool,
        #[arg(long)]
        inactive: bool,
    },
    /// Delete a student and their grades
    DeleteStudent {
        #[arg(long)]
        student: Uuid,
    },
    /// Find active students by name
    SearchStudents {
        /// At least two characters of the first or last name
        #[arg(long)]
        query: String,
    },
    /// Record a grade (0-10, comma or dot decimals)
    AddGrade {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        value: String,
        /// exam, homework or activity
        #[arg(long)]
        category: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Correct a recorded grade
    UpdateGrade {
        #[arg(long)]
        grade: Uuid,
        #[arg(long)]
        value: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    DeleteGrade {
        #[arg(long)]
        grade: Uuid,
    },
    /// Show a student's weighted average
    StudentAverage {
        #[arg(long)]
        student: Uuid,
    },
    /// Weighted averages for every active student in a class
    ClassAverages {
        #[arg(long)]
        class: String,
    },
    /// Assign homework to a class
    AddHomework {
        #[arg(long)]
        class: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        due: NaiveDate,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update a student's homework delivery
    #[command(group(
        ArgGroup::new("delivery")
            .args(["delivered", "pending"])
            .multiple(false)
    ))]
    MarkHomework {
        #[arg(long)]
        homework: Uuid,
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        delivered: bool,
        #[arg(long)]
        pending: bool,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Show delivery status for a homework
    HomeworkStatus {
        #[arg(long)]
        homework: Uuid,
    },
    /// Plan an excursion for a class
    AddExcursion {
        #[arg(long)]
        class: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        date: NaiveDate,
        /// Price per student, comma or dot decimals
        #[arg(long)]
        price: Option<String>,
    },
    /// Update a student's attendance, payment or comment
    #[command(group(
        ArgGroup::new("attendance")
            .args(["attends", "absent"])
            .multiple(false)
    ))]
    #[command(group(
        ArgGroup::new("payment")
            .args(["paid", "unpaid"])
            .multiple(false)
    ))]
    MarkExcursion {
        #[arg(long)]
        excursion: Uuid,
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        attends: bool,
        #[arg(long)]
        absent: bool,
        #[arg(long)]
        paid: bool,
        #[arg(long)]
        unpaid: bool,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Set attends or paid for the whole class
    MarkAllExcursion {
        #[arg(long)]
        excursion: Uuid,
        /// attends or paid
        #[arg(long)]
        field: ExcursionField,
        /// Clear the flag instead of setting it
        #[arg(long)]
        unset: bool,
    },
    /// Show attendance and payments for an excursion
    ExcursionStatus {
        #[arg(long)]
        excursion: Uuid,
    },
    DeleteExcursion {
        #[arg(long)]
        excursion: Uuid,
    },
    /// Ask one of the assistant agents
    Ask {
        /// teachers, families or management
        #[arg(long, default_value = "teachers")]
        agent: Agent,
        #[arg(long)]
        message: String,
        #[arg(long)]
        user: Option<String>,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn find_class(pool: &PgPool, name: &str) -> anyhow::Result<models::ClassRecord> {
    db::find_class(pool, name)
        .await?
        .with_context(|| format!("no class named {name:?}"))
}

async fn require_student(pool: &PgPool, student_id: Uuid) -> anyhow::Result<models::StudentRecord> {
    db::fetch_student(pool, student_id)
        .await?
        .with_context(|| format!("no student with id {student_id}"))
}

/// A pair of opposing flags; neither means "leave unchanged".
fn tri_state(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn format_average(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    logging::init_tracing(&config.log_level);

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            info!(inserted, path = %csv.display(), "csv import finished");
            println!("Inserted {inserted} academic records from {}.", csv.display());
        }
        Commands::Dashboard { filter, json } => {
            let pool = connect(&config).await?;
            let rows = db::fetch_academic_rows(&pool).await?;
            let filter = DashboardFilter::from(filter);
            let metrics = dashboard::compute_dashboard(&rows, &filter);

            if json {
                let options = dashboard::filter_options(&rows);
                let payload = serde_json::json!({ "filters": options, "metrics": metrics });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            if metrics.total_students == 0 {
                println!("No graded students match these filters.");
                return Ok(());
            }

            println!(
                "{} students across {} records, average {}, pass rate {}",
                metrics.total_students,
                metrics.row_count,
                format_average(metrics.global_average),
                metrics
                    .pass_rate
                    .map_or_else(|| "-".to_string(), |rate| format!("{:.1}%", rate * 100.0))
            );
            if let Some(trend) = metrics.trend {
                println!("Trend vs previous term: {trend:+.2}");
            }
            for entry in &metrics.subject_averages {
                println!("- {}: {}", entry.subject.label(), format_average(entry.average));
            }
        }
        Commands::Report { filter, out } => {
            let pool = connect(&config).await?;
            let rows = db::fetch_academic_rows(&pool).await?;
            let filter = DashboardFilter::from(filter);
            let metrics = dashboard::compute_dashboard(&rows, &filter);
            let report = report::build_report(&filter, &metrics, Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::AddClass { name } => {
            let pool = connect(&config).await?;
            let id = db::create_class(&pool, &name).await?;
            println!("Class {name} ready ({id}).");
        }
        Commands::DeleteClass { name } => {
            let pool = connect(&config).await?;
            let class = find_class(&pool, &name).await?;
            if !db::delete_class(&pool, class.id).await? {
                anyhow::bail!("class {name:?} was already deleted");
            }
            info!(class_id = %class.id, "class deleted");
            println!("Deleted class {name}.");
        }
        Commands::AddStudent {
            class,
            first_name,
            last_name,
            email,
        } => {
            let pool = connect(&config).await?;
            let class = find_class(&pool, &class).await?;
            let id = db::create_student(&pool, class.id, &first_name, &last_name, email.as_deref())
                .await?;
            println!("Enrolled {first_name} {last_name} in {} ({id}).", class.name);
        }
        Commands::UpdateStudent {
            student,
            first_name,
            last_name,
            email,
        } => {
            let pool = connect(&config).await?;
            if !db::update_student(
                &pool,
                student,
                first_name.as_deref(),
                last_name.as_deref(),
                email.as_deref(),
            )
            .await?
            {
                anyhow::bail!("no student with id {student}");
            }
            let record = require_student(&pool, student).await?;
            println!(
                "Updated {} <{}>.",
                record.full_name(),
                record.email.as_deref().unwrap_or("no email")
            );
        }
        Commands::SetStudentActive { student, active, .. } => {
            let pool = connect(&config).await?;
            let record = require_student(&pool, student).await?;
            let state = if active { "active" } else { "inactive" };
            if record.active == active {
                println!("{} is already {state}.", record.full_name());
                return Ok(());
            }
            db::set_student_active(&pool, student, active).await?;
            println!("{} is now {state}.", record.full_name());
        }
        Commands::DeleteStudent { student } => {
            let pool = connect(&config).await?;
            let record = require_student(&pool, student).await?;
            db::delete_student(&pool, student).await?;
            info!(student_id = %student, "student deleted");
            println!("Deleted {}.", record.full_name());
        }
        Commands::SearchStudents { query } => {
            let pool = connect(&config).await?;
            let students = db::fetch_all_active_students(&pool).await?;
            let classes = db::fetch_classes(&pool).await?;
            let found = roster::search_students(&students, &query);

            if found.is_empty() {
                println!("No active students match {query:?}.");
                return Ok(());
            }
            for student in found {
                let class_name = classes
                    .iter()
                    .find(|class| class.id == student.class_id)
                    .map_or("-", |class| class.name.as_str());
                println!(
                    "- {} ({class_name}) {}{}",
                    student.full_name(),
                    student.id,
                    student
                        .email
                        .as_deref()
                        .map(|email| format!(" <{email}>"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::AddGrade {
            student,
            value,
            category,
            date,
        } => {
            let (value, category) = grades::parse_grade_input(&value, &category)?;
            let pool = connect(&config).await?;
            let record = require_student(&pool, student).await?;
            db::insert_grade(&pool, student, value, category, date).await?;
            let history = db::fetch_grades_for_student(&pool, student).await?;
            println!(
                "Recorded {value:.2} ({}) for {}. Weighted average now {}.",
                category.as_str(),
                record.full_name(),
                format_average(grades::weighted_average(&history))
            );
        }
        Commands::UpdateGrade {
            grade,
            value,
            category,
            date,
        } => {
            let (value, category) = grades::parse_grade_input(&value, &category)?;
            let pool = connect(&config).await?;
            let student = db::update_grade(&pool, grade, value, category, date)
                .await?
                .with_context(|| format!("no grade with id {grade}"))?;
            let history = db::fetch_grades_for_student(&pool, student).await?;
            println!(
                "Grade updated to {value:.2} ({}). Weighted average now {}.",
                category.as_str(),
                format_average(grades::weighted_average(&history))
            );
        }
        Commands::DeleteGrade { grade } => {
            let pool = connect(&config).await?;
            let student = db::delete_grade(&pool, grade)
                .await?
                .with_context(|| format!("no grade with id {grade}"))?;
            let history = db::fetch_grades_for_student(&pool, student).await?;
            println!(
                "Grade deleted. Weighted average now {}.",
                format_average(grades::weighted_average(&history))
            );
        }
        Commands::StudentAverage { student } => {
            let pool = connect(&config).await?;
            let record = require_student(&pool, student).await?;
            let history = db::fetch_grades_for_student(&pool, student).await?;

            println!("{} ({} grades)", record.full_name(), history.len());
            for grade in &history {
                println!(
                    "  {} {:>5.2} {} [{}]",
                    grade
                        .date
                        .map_or_else(|| "----------".to_string(), |date| date.to_string()),
                    grade.value,
                    grade.category,
                    grade.id
                );
            }
            for entry in grades::category_breakdown(&history) {
                println!(
                    "- {} ({:.0}%): {:.2} across {} grades",
                    entry.category.as_str(),
                    entry.weight,
                    entry.mean,
                    entry.count
                );
            }
            println!("Weighted average: {}", format_average(grades::weighted_average(&history)));
        }
        Commands::ClassAverages { class } => {
            let pool = connect(&config).await?;
            let class = find_class(&pool, &class).await?;
            let students = db::fetch_active_students(&pool, class.id).await?;
            let class_grades = db::fetch_grades_for_class(&pool, class.id).await?;

            if students.is_empty() {
                println!("No active students in {}.", class.name);
                return Ok(());
            }

            println!("Weighted averages for {}:", class.name);
            for student in &students {
                let own: Vec<models::GradeRecord> = class_grades
                    .iter()
                    .filter(|grade| grade.student_id == student.id)
                    .cloned()
                    .collect();
                println!(
                    "- {} {}",
                    student.full_name(),
                    format_average(grades::weighted_average(&own))
                );
            }
        }
        Commands::AddHomework {
            class,
            title,
            subject,
            due,
            description,
        } => {
            let pool = connect(&config).await?;
            let class = find_class(&pool, &class).await?;
            let (id, assigned) = db::create_homework(
                &pool,
                class.id,
                &title,
                subject.as_deref(),
                due,
                description.as_deref(),
            )
            .await?;
            println!("Homework {title} ({id}) assigned to {assigned} students in {}.", class.name);
        }
        Commands::MarkHomework {
            homework: homework_id,
            student,
            delivered,
            pending,
            comment,
        } => {
            let pool = connect(&config).await?;
            let record = db::fetch_homework(&pool, homework_id)
                .await?
                .with_context(|| format!("no homework with id {homework_id}"))?;
            let student = require_student(&pool, student).await?;
            roster::ensure_same_class(&student, record.class_id)?;
            db::set_homework_status(
                &pool,
                homework_id,
                student.id,
                tri_state(delivered, pending),
                comment.as_deref(),
            )
            .await?;
            println!("Homework status updated.");
        }
        Commands::HomeworkStatus {
            homework: homework_id,
        } => {
            let pool = connect(&config).await?;
            let record = db::fetch_homework(&pool, homework_id)
                .await?
                .with_context(|| format!("no homework with id {homework_id}"))?;
            let statuses = db::fetch_homework_statuses(&pool, &record).await?;
            let summary = homework::summarize(&statuses);

            println!(
                "{}{} due {}: {}/{} delivered",
                record.title,
                record
                    .subject
                    .as_deref()
                    .map(|subject| format!(" ({subject})"))
                    .unwrap_or_default(),
                record.due_date,
                summary.delivered,
                summary.total
            );
            for status in &statuses {
                println!(
                    "- [{}] {} {}{}",
                    if status.delivered { "x" } else { " " },
                    status.student_name,
                    status.student_id,
                    status
                        .comment
                        .as_deref()
                        .map(|comment| format!(": {comment}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::AddExcursion {
            class,
            title,
            date,
            price,
        } => {
            let price = match price.as_deref() {
                Some(raw) => excursions::parse_price(raw)?,
                None => None,
            };
            let pool = connect(&config).await?;
            let class = find_class(&pool, &class).await?;
            let (id, listed) = db::create_excursion(&pool, class.id, &title, date, price).await?;
            println!("Excursion {title} ({id}) on {date} listed for {listed} students in {}.", class.name);
        }
        Commands::MarkExcursion {
            excursion: excursion_id,
            student,
            attends,
            absent,
            paid,
            unpaid,
            comment,
        } => {
            let pool = connect(&config).await?;
            let record = db::fetch_excursion(&pool, excursion_id)
                .await?
                .with_context(|| format!("no excursion with id {excursion_id}"))?;
            let student = require_student(&pool, student).await?;
            roster::ensure_same_class(&student, record.class_id)?;
            db::set_excursion_status(
                &pool,
                excursion_id,
                student.id,
                tri_state(attends, absent),
                tri_state(paid, unpaid),
                comment.as_deref(),
            )
            .await?;
            println!("Excursion status updated for {}.", student.full_name());
        }
        Commands::MarkAllExcursion {
            excursion: excursion_id,
            field,
            unset,
        } => {
            let pool = connect(&config).await?;
            let record = db::fetch_excursion(&pool, excursion_id)
                .await?
                .with_context(|| format!("no excursion with id {excursion_id}"))?;
            let updated = db::mark_all_excursion(&pool, &record, field, !unset).await?;
            println!("Set {field} = {} for {updated} students.", !unset);
        }
        Commands::ExcursionStatus {
            excursion: excursion_id,
        } => {
            let pool = connect(&config).await?;
            let record = db::fetch_excursion(&pool, excursion_id)
                .await?
                .with_context(|| format!("no excursion with id {excursion_id}"))?;
            let statuses = db::fetch_excursion_statuses(&pool, &record).await?;
            let summary = excursions::summarize(&statuses, record.price);

            println!(
                "{} on {}{}: {}/{} attending, {} paid, {} attending unpaid",
                record.title,
                record.date,
                record
                    .price
                    .map(|price| format!(" ({price:.2} EUR)"))
                    .unwrap_or_default(),
                summary.attending,
                summary.total,
                summary.paid,
                summary.outstanding
            );
            if let Some(collected) = summary.collected {
                println!("Collected: {collected:.2} EUR");
            }
            for status in &statuses {
                println!(
                    "- [{}] [{}] {} {}{}",
                    if status.attends { "x" } else { " " },
                    if status.paid { "paid" } else { "    " },
                    status.student_name,
                    status.student_id,
                    status
                        .comment
                        .as_deref()
                        .map(|comment| format!(": {comment}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::DeleteExcursion {
            excursion: excursion_id,
        } => {
            let pool = connect(&config).await?;
            if !db::delete_excursion(&pool, excursion_id).await? {
                anyhow::bail!("no excursion with id {excursion_id}");
            }
            println!("Excursion deleted.");
        }
        Commands::Ask {
            agent,
            message,
            user,
        } => {
            let client = RelayClient::new(config.require_relay_webhook_url()?, config.relay_timeout)?;
            let user_id = user.unwrap_or_else(relay::generate_user_id);
            let reply = client.send(agent, &user_id, &message).await?;
            println!("{}", reply.text());
        }
    }

    Ok(())
}
