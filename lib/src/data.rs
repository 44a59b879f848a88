use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::polls::Poll;

static AVATAR_SERVICE: Lazy<Url> = Lazy::new(|| {
    Url::parse("https://ui-avatars.com/api/").expect("avatar service URL is valid")
});

/// What the aggregations need to know about a lesson row.
pub trait LessonFacts {
    fn client_first_name(&self) -> &str;
    fn client_last_name(&self) -> &str;
    fn duration_hours(&self) -> f64;
    fn score(&self) -> Option<u8>;
    fn group_id(&self) -> Option<Uuid>;

    fn client_key(&self) -> ClientKey {
        ClientKey::new(self.client_first_name(), self.client_last_name())
    }
}

impl<T: LessonFacts + ?Sized> LessonFacts for &T {
    fn client_first_name(&self) -> &str {
        (**self).client_first_name()
    }

    fn client_last_name(&self) -> &str {
        (**self).client_last_name()
    }

    fn duration_hours(&self) -> f64 {
        (**self).duration_hours()
    }

    fn score(&self) -> Option<u8> {
        (**self).score()
    }

    fn group_id(&self) -> Option<Uuid> {
        (**self).group_id()
    }
}

/// One persisted lesson row. A group lesson is stored as one row per
/// student, all sharing the same `group_id`.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Lesson {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,

    pub client_first_name: String,
    pub client_last_name: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub duration_hours: f64,
    pub score: Option<u8>,
    pub note: Option<String>,
    pub group_id: Option<Uuid>,
}

impl Lesson {
    pub fn client_name(&self) -> ClientName {
        ClientName::new(&self.client_first_name, &self.client_last_name)
    }
}

impl LessonFacts for Lesson {
    fn client_first_name(&self) -> &str {
        &self.client_first_name
    }

    fn client_last_name(&self) -> &str {
        &self.client_last_name
    }

    fn duration_hours(&self) -> f64 {
        self.duration_hours
    }

    fn score(&self) -> Option<u8> {
        self.score
    }

    fn group_id(&self) -> Option<Uuid> {
        self.group_id
    }
}

/// The subset of a lesson row fetched for the dashboard.
#[derive(Clone, Debug, PartialEq)]
pub struct LessonSummary {
    pub client_first_name: String,
    pub client_last_name: String,
    pub duration_hours: f64,
    pub score: Option<u8>,
    pub group_id: Option<Uuid>,
}

impl LessonFacts for LessonSummary {
    fn client_first_name(&self) -> &str {
        &self.client_first_name
    }

    fn client_last_name(&self) -> &str {
        &self.client_last_name
    }

    fn duration_hours(&self) -> f64 {
        self.duration_hours
    }

    fn score(&self) -> Option<u8> {
        self.score
    }

    fn group_id(&self) -> Option<Uuid> {
        self.group_id
    }
}

/// Case-insensitive identity of a client, derived from their names.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self(format!("{}-{}", first_name.trim(), last_name.trim()).to_lowercase())
    }

    /// Accepts a key as printed by the clients list, in any case.
    pub fn parse(key: &str) -> Self {
        Self(key.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ClientName {
    pub first_name: String,
    pub last_name: String,
}

impl ClientName {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
        }
    }

    pub fn key(&self) -> ClientKey {
        ClientKey::new(&self.first_name, &self.last_name)
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,

    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> Option<&str> {
        display_name(self.full_name.as_deref(), self.username.as_deref())
    }

    pub fn avatar(&self) -> String {
        avatar_or_initials(
            self.avatar_url.as_deref(),
            self.display_name().unwrap_or("N A"),
        )
    }
}

/// The personal fields edited from the profile settings screen.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileDetails {
    #[serde(rename = "nome", default)]
    pub first_name: Option<String>,
    #[serde(rename = "cognome", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PostAuthor {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: String,
}

/// A post ready to be shown in the feed.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FormattedPost {
    pub id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author: PostAuthor,
    pub comment_count: i64,
    pub poll: Option<Poll>,
}

pub(crate) fn display_name<'a>(
    full_name: Option<&'a str>,
    username: Option<&'a str>,
) -> Option<&'a str> {
    full_name
        .filter(|name| !name.trim().is_empty())
        .or_else(|| username.filter(|name| !name.trim().is_empty()))
}

pub(crate) fn avatar_or_initials(avatar_url: Option<&str>, name: &str) -> String {
    match avatar_url.filter(|url| !url.trim().is_empty()) {
        Some(url) => url.to_owned(),
        None => {
            let mut url = AVATAR_SERVICE.clone();
            url.query_pairs_mut()
                .append_pair("name", name)
                .append_pair("background", "0D8ABC")
                .append_pair("color", "fff");
            url.to_string()
        }
    }
}
