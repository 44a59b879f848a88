use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::backend::{fetch_rows, Backend, BackendError, Select};
use crate::data::{Comment, Profile};
use crate::profiles::fetch_profile;
use crate::raw_data::NewCommentRow;

pub const COMMENTS_TABLE: &str = "comments";

#[derive(Clone, Debug, PartialEq)]
pub struct CommentView {
    pub comment: Comment,
    pub author: Option<Profile>,
}

/// Comments of a post, oldest first.
pub async fn fetch_comments(
    backend: &dyn Backend,
    post_id: i64,
) -> Result<Vec<Comment>, BackendError> {
    let query = Select::from(COMMENTS_TABLE)
        .columns("id,post_id,user_id,content,created_at")
        .eq("post_id", post_id)
        .order("created_at", true);

    fetch_rows(backend, &query).await
}

/// Comments with their authors. Each author is looked up on its own; a
/// failed lookup leaves that comment without an author.
pub async fn fetch_thread(
    backend: &dyn Backend,
    post_id: i64,
) -> Result<Vec<CommentView>, BackendError> {
    let comments = fetch_comments(backend, post_id).await?;
    let mut thread = Vec::with_capacity(comments.len());

    for comment in comments {
        let author = match fetch_profile(backend, comment.user_id).await {
            Ok(author) => author,
            Err(error) => {
                warn!(comment_id = comment.id, %error, "could not load comment author");
                None
            }
        };

        thread.push(CommentView { comment, author });
    }

    Ok(thread)
}

pub async fn add_comment(
    backend: &dyn Backend,
    user_id: Uuid,
    post_id: i64,
    content: &str,
) -> Result<(), BackendError> {
    let content = content.trim();

    if content.is_empty() {
        return Err(BackendError::rejected("a comment cannot be empty"));
    }

    let row = NewCommentRow {
        post_id,
        user_id,
        content: content.to_owned(),
    };
    backend
        .insert(COMMENTS_TABLE, vec![serde_json::to_value(row)?])
        .await?;

    Ok(())
}

const AGE_UNITS: [(f64, &str); 5] = [
    (31_536_000.0, "y"),
    (2_592_000.0, "m"),
    (86_400.0, "d"),
    (3_600.0, "h"),
    (60.0, "min"),
];

/// Compact age label such as `5h` or `2d`. A unit is used only once more
/// than one whole unit has passed, so exactly one hour reads `60min`.
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - created_at).num_seconds() as f64;

    for (unit_seconds, suffix) in AGE_UNITS {
        let interval = seconds / unit_seconds;
        if interval > 1.0 {
            return format!("{}{suffix}", interval.floor() as i64);
        }
    }

    format!("{}s", seconds.floor() as i64)
}
