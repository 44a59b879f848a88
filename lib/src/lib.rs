pub mod backend;
pub mod clients;
pub mod comments;
pub mod feed;
pub mod helpers;
pub mod lessons;
pub mod polls;
pub mod preferences;
pub mod profiles;
pub mod stats;

mod data;
mod raw_data;

#[cfg(test)]
mod test_support;

pub use backend::{Backend, BackendError};
pub use data::*;
pub use polls::{Poll, PollOption};
pub use preferences::{HourlyRate, Preferences};
pub use stats::{DashboardStats, Earnings, ScoreDisplay};
