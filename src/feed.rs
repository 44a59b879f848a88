use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use masterski::comments::{add_comment, fetch_thread, time_ago};
use masterski::feed::{create_post, fetch_feed, ImageAttachment, PollDraft, PostDraft};
use masterski::polls::{cast_vote, fetch_poll, fetch_user_vote};
use masterski::{Backend, FormattedPost, Poll};
use tracing::warn;
use uuid::Uuid;

pub async fn show_feed(backend: &dyn Backend, user_id: Uuid, author: Option<Uuid>) -> Result<()> {
    let posts = fetch_feed(backend, author).await.context("loading feed")?;

    print_posts(backend, user_id, posts).await;

    Ok(())
}

/// Prints posts as fetched; `user_id` decides which poll votes show as mine.
pub async fn print_posts(backend: &dyn Backend, user_id: Uuid, posts: Vec<FormattedPost>) {
    let now = Utc::now();

    if posts.is_empty() {
        println!("Nothing posted yet.");
    }

    for post in posts {
        println!(
            "#{} {} · {} ago",
            post.id,
            post.author.name,
            time_ago(post.created_at, now)
        );
        if !post.content.is_empty() {
            println!("{}", post.content);
        }
        if let Some(image_url) = &post.image_url {
            println!("[image] {image_url}");
        }
        if let Some(poll) = &post.poll {
            let voted = match fetch_user_vote(backend, poll.id, user_id).await {
                Ok(voted) => voted,
                Err(error) => {
                    warn!(poll_id = poll.id, %error, "could not load own vote");
                    None
                }
            };
            print_poll(poll, voted);
        }
        println!("{} comment(s)", post.comment_count);
        println!();
    }
}

fn print_poll(poll: &Poll, voted: Option<usize>) {
    println!("Poll {}: {}", poll.id, poll.question);

    for (index, option) in poll.options.iter().enumerate() {
        let marker = if voted == Some(index) { "*" } else { " " };

        match voted {
            Some(_) => println!(
                " {marker}{}. {}  {}% ({})",
                index + 1,
                option.text,
                poll.rounded_percentage(index),
                option.votes
            ),
            None => println!("  {}. {}", index + 1, option.text),
        }
    }

    if voted.is_some() {
        println!("  {} vote(s)", poll.total_votes());
    }
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

async fn load_image(path: &Path) -> Result<ImageAttachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading image {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("image path {} has no file name", path.display()))?
        .to_owned();

    Ok(ImageAttachment {
        file_name,
        content_type: content_type(path).to_owned(),
        bytes,
    })
}

pub struct NewPost<'a> {
    pub text: String,
    pub image: Option<&'a Path>,
    pub poll_question: Option<String>,
    pub poll_options: Vec<String>,
}

pub async fn publish(backend: &dyn Backend, user_id: Uuid, post: NewPost<'_>) -> Result<()> {
    let image = match post.image {
        Some(path) => Some(load_image(path).await?),
        None => None,
    };
    let poll = post.poll_question.map(|question| PollDraft {
        question,
        options: post.poll_options,
    });

    if let Some(poll) = poll.as_ref().filter(|poll| !poll.is_valid()) {
        warn!(question = %poll.question, "poll needs a question and two options, skipping it");
    }

    let draft = PostDraft {
        content: post.text,
        image,
        poll,
    };

    let created = create_post(backend, user_id, draft, Utc::now())
        .await
        .context("publishing post")?;

    println!("Published post #{}", created.id);
    if let Some(image_url) = created.image_url {
        println!("Image: {image_url}");
    }
    if created.poll_attached {
        println!("Poll attached");
    }

    Ok(())
}

pub async fn show_comments(backend: &dyn Backend, post_id: i64) -> Result<()> {
    let thread = fetch_thread(backend, post_id)
        .await
        .context("loading comments")?;
    let now = Utc::now();

    if thread.is_empty() {
        println!("No comments on post #{post_id}.");
    }

    for entry in thread {
        let author = entry
            .author
            .as_ref()
            .and_then(|author| author.display_name())
            .unwrap_or("User");

        println!(
            "{author} · {}: {}",
            time_ago(entry.comment.created_at, now),
            entry.comment.content
        );
    }

    Ok(())
}

pub async fn comment(backend: &dyn Backend, user_id: Uuid, post_id: i64, text: &str) -> Result<()> {
    add_comment(backend, user_id, post_id, text)
        .await
        .context("adding comment")?;

    println!("Comment added to post #{post_id}");

    Ok(())
}

/// `option` counts from one, as printed by the feed.
pub async fn vote(backend: &dyn Backend, user_id: Uuid, poll_id: i64, option: usize) -> Result<()> {
    let poll = fetch_poll(backend, poll_id)
        .await
        .context("loading poll")?
        .ok_or_else(|| anyhow!("poll {poll_id} not found"))?;
    let index = option
        .checked_sub(1)
        .ok_or_else(|| anyhow!("options are numbered from 1"))?;

    let updated = cast_vote(backend, &poll, user_id, index)
        .await
        .context("casting vote")?;

    print_poll(&updated, Some(index));

    Ok(())
}
