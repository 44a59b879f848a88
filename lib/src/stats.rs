//! Dashboard aggregates over one user's lesson rows.

use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

use crate::data::LessonFacts;

/// Sum of lesson durations where every group lesson counts once, however
/// many student rows share its group id. The first row seen for a group
/// decides its duration. Rows are added in the order given.
pub fn total_hours<L: LessonFacts>(lessons: &[L]) -> f64 {
    let mut seen_groups: HashSet<Uuid> = HashSet::new();

    lessons
        .iter()
        .filter(|lesson| match lesson.group_id() {
            Some(group_id) => seen_groups.insert(group_id),
            None => true,
        })
        .map(LessonFacts::duration_hours)
        .sum()
}

/// Mean of the scores that were given. `None` when no row has a score.
pub fn average_score<L: LessonFacts>(lessons: &[L]) -> Option<f64> {
    let scores = lessons
        .iter()
        .filter_map(LessonFacts::score)
        .map(f64::from)
        .collect::<Vec<_>>();

    if scores.is_empty() {
        return None;
    }

    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

pub fn unique_clients<L: LessonFacts>(lessons: &[L]) -> usize {
    lessons
        .iter()
        .map(LessonFacts::client_key)
        .collect::<HashSet<_>>()
        .len()
}

/// An average score as shown to the user: one decimal, or `-`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreDisplay(pub Option<f64>);

impl fmt::Display for ScoreDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(score) => write!(f, "{score:.1}"),
            None => f.write_str("-"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DashboardStats {
    pub total_hours: f64,
    pub average_score: Option<f64>,
    pub total_clients: usize,
}

impl DashboardStats {
    pub fn from_lessons<L: LessonFacts>(lessons: &[L]) -> Self {
        Self {
            total_hours: total_hours(lessons),
            average_score: average_score(lessons),
            total_clients: unique_clients(lessons),
        }
    }

    pub fn score_display(&self) -> ScoreDisplay {
        ScoreDisplay(self.average_score)
    }

    pub fn earnings(&self, hourly_rate: f64) -> Earnings {
        Earnings {
            hours: self.total_hours,
            hourly_rate,
        }
    }
}

/// Hours worked times the hourly rate. With no rate set the amount is
/// unknown and shows as `€?`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Earnings {
    pub hours: f64,
    pub hourly_rate: f64,
}

impl Earnings {
    pub fn amount(&self) -> Option<f64> {
        if self.hourly_rate == 0.0 {
            None
        } else {
            Some(self.hours * self.hourly_rate)
        }
    }
}

impl fmt::Display for Earnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amount() {
            Some(amount) => write!(f, "€{:.0}", amount.round()),
            None => f.write_str("€?"),
        }
    }
}
