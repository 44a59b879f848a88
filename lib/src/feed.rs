//! The social feed: reading posts and publishing new ones.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::{decode_rows, fetch_rows, Backend, BackendError, Select, Upload};
use crate::data::{avatar_or_initials, display_name, FormattedPost, PostAuthor};
use crate::polls::{PollOption, POLLS_TABLE};
use crate::raw_data::{NewPollRow, NewPostRow, RawCommentCount, RawId, RawPost};

pub const POSTS_TABLE: &str = "posts";
pub const IMAGE_BUCKET: &str = "post_images";
pub const COMMENT_COUNTS_RPC: &str = "get_comment_counts";

const IMAGE_CACHE_SECS: u32 = 3600;
const UNKNOWN_AUTHOR: &str = "Unknown user";
const POST_COLUMNS: &str = "id,content,image_url,created_at,user_id,\
    profiles(username,full_name,avatar_url),polls(id,question,options)";

/// Posts newest first, optionally only those of one author.
pub async fn fetch_feed(
    backend: &dyn Backend,
    author: Option<Uuid>,
) -> Result<Vec<FormattedPost>, BackendError> {
    let mut query = Select::from(POSTS_TABLE)
        .columns(POST_COLUMNS)
        .order("created_at", false);

    if let Some(author) = author {
        query = query.eq("user_id", author);
    }

    let posts = fetch_rows::<RawPost>(backend, &query).await?;
    let counts = fetch_comment_counts(backend).await;

    Ok(posts
        .into_iter()
        .map(|post| {
            let comment_count = counts.get(&post.id).copied().unwrap_or(0);
            format_post(post, comment_count)
        })
        .collect())
}

/// Comment counts per post. A failure here only costs the counts, so it is
/// logged and treated as "no comments".
async fn fetch_comment_counts(backend: &dyn Backend) -> HashMap<i64, i64> {
    let counts = match backend.rpc(COMMENT_COUNTS_RPC, serde_json::json!({})).await {
        Ok(serde_json::Value::Array(rows)) => decode_rows::<RawCommentCount>(rows),
        Ok(other) => Err(BackendError::Decode(format!(
            "expected an array of comment counts, got {other}"
        ))),
        Err(error) => Err(error),
    };

    match counts {
        Ok(counts) => counts
            .into_iter()
            .map(|count| (count.post_id, count.comment_count))
            .collect(),
        Err(error) => {
            error!(%error, "could not fetch comment counts");
            HashMap::new()
        }
    }
}

fn format_post(post: RawPost, comment_count: i64) -> FormattedPost {
    let profile = post
        .profiles
        .and_then(|profiles| profiles.into_first())
        .unwrap_or_default();
    let name = display_name(profile.full_name.as_deref(), profile.username.as_deref())
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_owned();
    let avatar_url = avatar_or_initials(
        profile.avatar_url.as_deref(),
        profile
            .full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("U S"),
    );

    FormattedPost {
        id: post.id,
        content: post.content.unwrap_or_default(),
        image_url: post.image_url,
        created_at: post.created_at,
        author: PostAuthor {
            id: post.user_id,
            name,
            avatar_url,
        },
        comment_count,
        poll: post.polls.and_then(|polls| polls.into_first()),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .filter(|extension| !extension.is_empty())
            .unwrap_or("bin")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
}

impl PollDraft {
    fn filled_options(&self) -> Vec<&str> {
        self.options
            .iter()
            .map(|option| option.trim())
            .filter(|option| !option.is_empty())
            .collect()
    }

    /// A question and at least two non-blank options.
    pub fn is_valid(&self) -> bool {
        !self.question.trim().is_empty() && self.filled_options().len() >= 2
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub content: String,
    pub image: Option<ImageAttachment>,
    pub poll: Option<PollDraft>,
}

impl PostDraft {
    fn valid_poll(&self) -> Option<&PollDraft> {
        self.poll.as_ref().filter(|poll| poll.is_valid())
    }

    fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.image.is_none() && self.valid_poll().is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedPost {
    pub id: i64,
    pub image_url: Option<String>,
    pub poll_attached: bool,
}

/// Publishes a post: image upload, post row, then the poll row. The steps
/// are separate requests; a failed poll insert is reported but the post it
/// belongs to is kept.
pub async fn create_post(
    backend: &dyn Backend,
    user_id: Uuid,
    draft: PostDraft,
    now: DateTime<Utc>,
) -> Result<CreatedPost, BackendError> {
    if draft.is_empty() {
        return Err(BackendError::rejected(
            "a post needs text, an image or a poll with at least two options",
        ));
    }

    let image_url = match &draft.image {
        Some(image) => {
            let upload = Upload {
                bucket: IMAGE_BUCKET.to_owned(),
                path: format!(
                    "{user_id}/{}.{}",
                    now.timestamp_millis(),
                    image.extension()
                ),
                content_type: image.content_type.clone(),
                cache_control_secs: IMAGE_CACHE_SECS,
                upsert: false,
                bytes: image.bytes.clone(),
            };

            Some(backend.upload(upload).await?.to_string())
        }
        None => None,
    };

    let row = NewPostRow {
        user_id,
        content: draft.content.trim().to_owned(),
        image_url: image_url.clone(),
    };
    let stored = backend
        .insert(POSTS_TABLE, vec![serde_json::to_value(row)?])
        .await?;
    let post_id = decode_rows::<RawId>(stored)?
        .into_iter()
        .next()
        .map(|row| row.id)
        .ok_or_else(|| BackendError::Decode("post insert returned no row".to_owned()))?;

    info!(post_id, "post published");

    let Some(poll) = draft.valid_poll() else {
        return Ok(CreatedPost {
            id: post_id,
            image_url,
            poll_attached: false,
        });
    };

    let row = NewPollRow {
        post_id,
        question: poll.question.trim().to_owned(),
        options: poll.filled_options().into_iter().map(PollOption::new).collect(),
    };

    if let Err(error) = backend
        .insert(POLLS_TABLE, vec![serde_json::to_value(row)?])
        .await
    {
        warn!(post_id, %error, "post published without its poll");

        return Err(error);
    }

    Ok(CreatedPost {
        id: post_id,
        image_url,
        poll_attached: true,
    })
}
