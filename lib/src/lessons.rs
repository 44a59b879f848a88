//! Lesson bookkeeping against the `lezioni_sci` table.

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{fetch_rows, Backend, BackendError, Select};
use crate::clients::distinct_client_names;
use crate::data::{ClientName, Lesson, LessonSummary};
use crate::raw_data::{NewLessonRow, RawClientName, RawLesson, RawLessonSummary};
use crate::stats::DashboardStats;

pub const LESSONS_TABLE: &str = "lezioni_sci";

pub const DEFAULT_SCORE: u8 = 6;
pub const MAX_SCORE: u8 = 10;

const SUMMARY_COLUMNS: &str = "group_id,durata_ore,voto_obiettivi,nome_cliente,cognome_cliente";

pub async fn fetch_dashboard(
    backend: &dyn Backend,
    user_id: Uuid,
) -> Result<DashboardStats, BackendError> {
    let query = Select::from(LESSONS_TABLE)
        .columns(SUMMARY_COLUMNS)
        .eq("user_id", user_id);

    let lessons = fetch_rows::<RawLessonSummary>(backend, &query)
        .await?
        .into_iter()
        .map(LessonSummary::from)
        .collect::<Vec<_>>();

    debug!(rows = lessons.len(), "computing dashboard");

    Ok(DashboardStats::from_lessons(&lessons))
}

/// Every lesson of the user, most recent lesson date first.
pub async fn fetch_lessons(
    backend: &dyn Backend,
    user_id: Uuid,
) -> Result<Vec<Lesson>, BackendError> {
    let query = Select::from(LESSONS_TABLE)
        .eq("user_id", user_id)
        .order("data_lezione", false);

    Ok(fetch_rows::<RawLesson>(backend, &query)
        .await?
        .into_iter()
        .map(Lesson::from)
        .collect())
}

pub async fn fetch_past_clients(
    backend: &dyn Backend,
    user_id: Uuid,
) -> Result<Vec<ClientName>, BackendError> {
    let query = Select::from(LESSONS_TABLE)
        .columns("nome_cliente,cognome_cliente")
        .eq("user_id", user_id);

    let names = fetch_rows::<RawClientName>(backend, &query)
        .await?
        .into_iter()
        .map(|raw| ClientName::new(&raw.first_name, &raw.last_name))
        .collect();

    Ok(distinct_client_names(names))
}

#[derive(Clone, Debug, PartialEq)]
pub struct StudentForm {
    pub first_name: String,
    pub last_name: String,
    pub score: u8,
    pub note: String,
}

impl StudentForm {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            score: DEFAULT_SCORE,
            note: String::new(),
        }
    }
}

/// One lesson taught to one or more students at the same time.
#[derive(Clone, Debug, PartialEq)]
pub struct LessonForm {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub duration_hours: f64,
    pub students: Vec<StudentForm>,
}

impl LessonForm {
    fn check(&self) -> Result<(), BackendError> {
        if self.students.is_empty() {
            return Err(BackendError::rejected("a lesson needs at least one student"));
        }

        if !self.duration_hours.is_finite() || self.duration_hours <= 0.0 {
            return Err(BackendError::rejected(format!(
                "invalid lesson duration {}",
                self.duration_hours
            )));
        }

        for (index, student) in self.students.iter().enumerate() {
            if student.first_name.trim().is_empty() || student.last_name.trim().is_empty() {
                return Err(BackendError::rejected(format!(
                    "student #{} needs a first and a last name",
                    index + 1
                )));
            }

            if student.score > MAX_SCORE {
                return Err(BackendError::rejected(format!(
                    "student #{} has score {}, the maximum is {MAX_SCORE}",
                    index + 1,
                    student.score
                )));
            }
        }

        Ok(())
    }

    fn rows(&self, user_id: Uuid, group_id: Uuid) -> Vec<NewLessonRow> {
        self.students
            .iter()
            .map(|student| {
                let note = student.note.trim();

                NewLessonRow {
                    user_id,
                    group_id,
                    client_first_name: student.first_name.trim().to_owned(),
                    client_last_name: student.last_name.trim().to_owned(),
                    date: self.date,
                    start_time: self.start_time,
                    duration_hours: self.duration_hours,
                    score: student.score,
                    note: (!note.is_empty()).then(|| note.to_owned()),
                }
            })
            .collect()
    }
}

/// Stores one row per student, all sharing a fresh group id, in a single
/// insert. Returns the group id.
pub async fn add_lesson(
    backend: &dyn Backend,
    user_id: Uuid,
    form: &LessonForm,
) -> Result<Uuid, BackendError> {
    form.check()?;

    let group_id = Uuid::new_v4();
    let rows = form
        .rows(user_id, group_id)
        .into_iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    backend.insert(LESSONS_TABLE, rows).await?;

    info!(%group_id, students = form.students.len(), "lesson saved");

    Ok(group_id)
}
