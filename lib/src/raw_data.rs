use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::{Lesson, LessonSummary};
use crate::polls::{Poll, PollOption};

#[derive(Deserialize, Debug)]
pub struct RawLesson {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,

    #[serde(rename = "nome_cliente")]
    pub client_first_name: String,
    #[serde(rename = "cognome_cliente")]
    pub client_last_name: String,
    #[serde(rename = "data_lezione")]
    pub date: NaiveDate,
    #[serde(rename = "ora_inizio", default)]
    pub start_time: Option<NaiveTime>,
    #[serde(rename = "durata_ore")]
    pub duration_hours: f64,
    #[serde(rename = "voto_obiettivi", default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
}

impl From<RawLesson> for Lesson {
    fn from(raw: RawLesson) -> Self {
        Self {
            id: raw.id,
            created_at: raw.created_at,
            client_first_name: raw.client_first_name,
            client_last_name: raw.client_last_name,
            date: raw.date,
            start_time: raw.start_time,
            duration_hours: raw.duration_hours,
            score: raw.score,
            note: raw.note.filter(|note| !note.trim().is_empty()),
            group_id: raw.group_id,
        }
    }
}

/// The columns the dashboard needs, nothing more.
#[derive(Deserialize, Debug)]
pub struct RawLessonSummary {
    #[serde(rename = "nome_cliente")]
    pub client_first_name: String,
    #[serde(rename = "cognome_cliente")]
    pub client_last_name: String,
    #[serde(rename = "durata_ore")]
    pub duration_hours: f64,
    #[serde(rename = "voto_obiettivi", default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
}

impl From<RawLessonSummary> for LessonSummary {
    fn from(raw: RawLessonSummary) -> Self {
        Self {
            client_first_name: raw.client_first_name,
            client_last_name: raw.client_last_name,
            duration_hours: raw.duration_hours,
            score: raw.score,
            group_id: raw.group_id,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct RawClientName {
    #[serde(rename = "nome_cliente")]
    pub first_name: String,
    #[serde(rename = "cognome_cliente")]
    pub last_name: String,
}

#[derive(Serialize, Debug)]
pub struct NewLessonRow {
    pub user_id: Uuid,
    pub group_id: Uuid,

    #[serde(rename = "nome_cliente")]
    pub client_first_name: String,
    #[serde(rename = "cognome_cliente")]
    pub client_last_name: String,
    #[serde(rename = "data_lezione")]
    pub date: NaiveDate,
    #[serde(rename = "ora_inizio")]
    pub start_time: Option<NaiveTime>,
    #[serde(rename = "durata_ore")]
    pub duration_hours: f64,
    #[serde(rename = "voto_obiettivi")]
    pub score: u8,
    pub note: Option<String>,
}

/// Embedded relations arrive either as an object or as an array,
/// depending on how the backend infers the foreign key.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_first(self) -> Option<T> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(items) => items.into_iter().next(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct RawProfileEmbed {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct RawPost {
    pub id: i64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,

    #[serde(default)]
    pub profiles: Option<OneOrMany<RawProfileEmbed>>,
    #[serde(default)]
    pub polls: Option<OneOrMany<Poll>>,
}

#[derive(Deserialize, Debug)]
pub struct RawCommentCount {
    pub post_id: i64,
    pub comment_count: i64,
}

#[derive(Deserialize, Debug)]
pub struct RawId {
    pub id: i64,
}

#[derive(Serialize, Debug)]
pub struct NewPostRow {
    pub user_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct NewPollRow {
    pub post_id: i64,
    pub question: String,
    pub options: Vec<PollOption>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RawVote {
    pub selected_option: usize,
}

#[derive(Serialize, Debug)]
pub struct NewVoteRow {
    pub poll_id: i64,
    pub user_id: Uuid,
    pub selected_option: usize,
}

#[derive(Serialize, Debug)]
pub struct NewCommentRow {
    pub post_id: i64,
    pub user_id: Uuid,
    pub content: String,
}
