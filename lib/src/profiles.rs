use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::backend::{fetch_optional, fetch_rows, Backend, BackendError, Filter, Select};
use crate::data::{FormattedPost, Profile, ProfileDetails};
use crate::feed::fetch_feed;

pub const PROFILES_TABLE: &str = "profiles";

pub async fn fetch_profile(
    backend: &dyn Backend,
    user_id: Uuid,
) -> Result<Option<Profile>, BackendError> {
    let query = Select::from(PROFILES_TABLE)
        .columns("id,username,full_name,avatar_url")
        .eq("id", user_id);

    fetch_optional(backend, &query).await
}

/// What another instructor's profile page shows: their header and posts.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorPage {
    pub profile: Option<Profile>,
    pub posts: Vec<FormattedPost>,
}

pub async fn fetch_author_page(
    backend: &dyn Backend,
    author: Uuid,
) -> Result<AuthorPage, BackendError> {
    let profile = fetch_profile(backend, author).await?;
    let posts = fetch_feed(backend, Some(author)).await?;

    Ok(AuthorPage { profile, posts })
}

pub async fn fetch_profile_details(
    backend: &dyn Backend,
    user_id: Uuid,
) -> Result<ProfileDetails, BackendError> {
    let query = Select::from(PROFILES_TABLE)
        .columns("nome,cognome,instagram,facebook,bio")
        .eq("id", user_id);

    Ok(fetch_optional(backend, &query).await?.unwrap_or_default())
}

/// Creates or overwrites the personal fields of the user's profile.
pub async fn save_profile_details(
    backend: &dyn Backend,
    user_id: Uuid,
    details: &ProfileDetails,
    now: DateTime<Utc>,
) -> Result<(), BackendError> {
    let mut row = serde_json::to_value(details)?;

    if let Some(row) = row.as_object_mut() {
        row.insert("id".to_owned(), json!(user_id));
        row.insert("updated_at".to_owned(), json!(now));
    }

    backend.upsert(PROFILES_TABLE, row).await?;

    info!(%user_id, "profile details saved");

    Ok(())
}

/// Sets the public username, refusing one already used by someone else.
pub async fn claim_username(
    backend: &dyn Backend,
    user_id: Uuid,
    username: &str,
    now: DateTime<Utc>,
) -> Result<(), BackendError> {
    let username = username.trim();

    if username.is_empty() {
        return Err(BackendError::rejected("username cannot be empty"));
    }

    let query = Select::from(PROFILES_TABLE)
        .columns("id")
        .eq("username", username)
        .neq("id", user_id);
    let holders = fetch_rows::<IgnoredAny>(backend, &query).await?;

    if !holders.is_empty() {
        return Err(BackendError::rejected(format!(
            "username {username} is already taken"
        )));
    }

    backend
        .update(
            PROFILES_TABLE,
            &[Filter::eq("id", user_id)],
            json!({ "username": username, "updated_at": now }),
        )
        .await?;

    info!(%user_id, username, "username claimed");

    Ok(())
}
