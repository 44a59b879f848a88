use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use masterski::clients::suggest_clients;
use masterski::lessons::{add_lesson, fetch_past_clients, LessonForm, StudentForm, MAX_SCORE};
use masterski::Backend;
use uuid::Uuid;

/// One `--student` value: `First,Last[,score[,note]]`. The note may itself
/// contain commas.
#[derive(Clone, Debug, PartialEq)]
pub struct StudentArg(pub StudentForm);

impl FromStr for StudentArg {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut parts = text.splitn(4, ',').map(str::trim);

        let (Some(first_name), Some(last_name)) = (parts.next(), parts.next()) else {
            bail!("expected First,Last[,score[,note]], got {text:?}");
        };

        if first_name.is_empty() || last_name.is_empty() {
            bail!("a student needs a first and a last name, got {text:?}");
        }

        let mut student = StudentForm::new(first_name, last_name);

        if let Some(score) = parts.next().filter(|score| !score.is_empty()) {
            student.score = score
                .parse()
                .with_context(|| format!("invalid score {score:?}"))?;

            if student.score > MAX_SCORE {
                bail!("score {} is above the maximum of {MAX_SCORE}", student.score);
            }
        }

        if let Some(note) = parts.next() {
            student.note = note.to_owned();
        }

        Ok(Self(student))
    }
}

pub struct NewLesson {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub duration_hours: f64,
    pub students: Vec<StudentArg>,
}

pub async fn add(backend: &dyn Backend, user_id: Uuid, lesson: NewLesson) -> Result<()> {
    let form = LessonForm {
        date: lesson.date,
        start_time: lesson.start_time,
        duration_hours: lesson.duration_hours,
        students: lesson
            .students
            .into_iter()
            .map(|StudentArg(student)| student)
            .collect(),
    };

    let group_id = add_lesson(backend, user_id, &form)
        .await
        .context("saving lesson")?;

    println!(
        "Saved {}h lesson on {} for {} student(s) (group {group_id})",
        form.duration_hours,
        form.date,
        form.students.len()
    );

    Ok(())
}

pub async fn suggest(backend: &dyn Backend, user_id: Uuid, fragment: &str) -> Result<()> {
    let known = fetch_past_clients(backend, user_id)
        .await
        .context("loading past clients")?;

    for name in suggest_clients(&known, fragment) {
        println!("{name}");
    }

    Ok(())
}
