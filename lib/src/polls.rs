//! Polls attached to posts, and voting on them.
//!
//! The backend keeps the tally inside the poll row and records who voted
//! in `poll_votes`, unique per poll and user. Casting a vote is two
//! requests: the vote record first, then the updated tally.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{fetch_optional, Backend, BackendError, Filter, Select};
use crate::raw_data::{NewVoteRow, RawVote};

pub const POLLS_TABLE: &str = "polls";
pub const VOTES_TABLE: &str = "poll_votes";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PollOption {
    pub text: String,
    pub votes: u32,
}

impl PollOption {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            votes: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub options: Vec<PollOption>,
}

impl Poll {
    pub fn total_votes(&self) -> u32 {
        self.options.iter().map(|option| option.votes).sum()
    }

    /// Share of the votes for one option, in percent. Zero while nobody has
    /// voted, and zero for an index past the last option.
    pub fn percentage(&self, index: usize) -> f64 {
        let total = self.total_votes();

        match self.options.get(index) {
            Some(option) if total > 0 => f64::from(option.votes) / f64::from(total) * 100.0,
            _ => 0.0,
        }
    }

    pub fn rounded_percentage(&self, index: usize) -> u32 {
        self.percentage(index).round() as u32
    }

    /// The poll with one more vote on `index`.
    pub fn with_vote(&self, index: usize) -> Result<Self, BackendError> {
        if index >= self.options.len() {
            return Err(BackendError::rejected(format!(
                "poll {} has no option {}",
                self.id,
                index + 1
            )));
        }

        let mut poll = self.clone();
        poll.options[index].votes += 1;

        Ok(poll)
    }
}

pub async fn fetch_poll(backend: &dyn Backend, poll_id: i64) -> Result<Option<Poll>, BackendError> {
    let query = Select::from(POLLS_TABLE)
        .columns("id,question,options")
        .eq("id", poll_id);

    fetch_optional(backend, &query).await
}

/// The option index this user picked, if they voted.
pub async fn fetch_user_vote(
    backend: &dyn Backend,
    poll_id: i64,
    user_id: Uuid,
) -> Result<Option<usize>, BackendError> {
    let query = Select::from(VOTES_TABLE)
        .columns("selected_option")
        .eq("poll_id", poll_id)
        .eq("user_id", user_id);

    let vote: Option<RawVote> = fetch_optional(backend, &query).await?;

    Ok(vote.map(|vote| vote.selected_option))
}

/// Records the vote and writes back the incremented tally. If the tally
/// write fails the vote record stays; nothing is rolled back.
pub async fn cast_vote(
    backend: &dyn Backend,
    poll: &Poll,
    user_id: Uuid,
    option: usize,
) -> Result<Poll, BackendError> {
    let updated = poll.with_vote(option)?;

    if let Some(previous) = fetch_user_vote(backend, poll.id, user_id).await? {
        warn!(poll_id = poll.id, previous, "user already voted");

        return Err(BackendError::rejected("you already voted in this poll"));
    }

    let vote = NewVoteRow {
        poll_id: poll.id,
        user_id,
        selected_option: option,
    };
    backend
        .insert(VOTES_TABLE, vec![serde_json::to_value(vote)?])
        .await?;

    backend
        .update(
            POLLS_TABLE,
            &[Filter::eq("id", poll.id)],
            serde_json::json!({ "options": updated.options }),
        )
        .await?;

    info!(poll_id = poll.id, option, "vote recorded");

    Ok(updated)
}
