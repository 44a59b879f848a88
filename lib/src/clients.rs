//! Clients derived from lesson rows, and the navigation between the list,
//! one client's history, and one lesson.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::data::{ClientKey, ClientName, Lesson, LessonFacts};
use crate::stats::total_hours;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ClientSummary {
    pub key: ClientKey,
    pub first_name: String,
    pub last_name: String,
    pub total_hours: f64,
    pub lesson_count: usize,
}

impl ClientSummary {
    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect()
    }
}

/// One entry per client in the order they first appear. Names are taken
/// from the first row seen. Hours follow [`total_hours`], so a client
/// listed twice in one group lesson is not billed twice.
pub fn summarize_clients<L: LessonFacts>(lessons: &[L]) -> Vec<ClientSummary> {
    let mut order: Vec<ClientKey> = Vec::new();
    let mut rows_by_client: HashMap<ClientKey, Vec<&L>> = HashMap::new();

    for lesson in lessons {
        let key = lesson.client_key();

        rows_by_client
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(lesson);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let rows = rows_by_client.remove(&key)?;
            let first = rows.first()?;

            Some(ClientSummary {
                first_name: first.client_first_name().to_owned(),
                last_name: first.client_last_name().to_owned(),
                total_hours: total_hours(&rows),
                lesson_count: rows.len(),
                key,
            })
        })
        .collect()
}

pub fn client_history<'a>(lessons: &'a [Lesson], key: &ClientKey) -> Vec<&'a Lesson> {
    lessons
        .iter()
        .filter(|lesson| &lesson.client_key() == key)
        .collect()
}

/// Past clients with duplicates (by key) removed, first spelling wins.
pub fn distinct_client_names(names: Vec<ClientName>) -> Vec<ClientName> {
    let mut seen = std::collections::HashSet::new();

    names
        .into_iter()
        .filter(|name| seen.insert(name.key()))
        .collect()
}

/// Autocomplete for the first-name field of the add-lesson form.
pub fn suggest_clients<'a>(known: &'a [ClientName], fragment: &str) -> Vec<&'a ClientName> {
    let fragment = fragment.trim().to_lowercase();

    if fragment.is_empty() {
        return Vec::new();
    }

    known
        .iter()
        .filter(|name| name.first_name.to_lowercase().contains(&fragment))
        .collect()
}

/// Which part of the clients screen is showing. Back-navigation is
/// strictly linear: detail, then history, then list, then out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientsView {
    List,
    History { client: ClientKey },
    Detail { client: ClientKey, lesson: Uuid },
}

impl ClientsView {
    pub fn select(client: Option<ClientKey>, lesson: Option<Uuid>) -> Self {
        match (client, lesson) {
            (Some(client), Some(lesson)) => Self::Detail { client, lesson },
            (Some(client), None) => Self::History { client },
            (None, _) => Self::List,
        }
    }

    pub fn open_client(self, client: ClientKey) -> Self {
        Self::History { client }
    }

    pub fn open_lesson(self, lesson: Uuid) -> Self {
        match self {
            Self::History { client } | Self::Detail { client, .. } => {
                Self::Detail { client, lesson }
            }
            Self::List => Self::List,
        }
    }

    /// `None` means leaving the clients screen.
    pub fn back(self) -> Option<Self> {
        match self {
            Self::Detail { client, .. } => Some(Self::History { client }),
            Self::History { .. } => Some(Self::List),
            Self::List => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    fn lesson(first: &str, last: &str, hours: f64, group: Option<Uuid>) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            client_first_name: first.to_owned(),
            client_last_name: last.to_owned(),
            date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            start_time: None,
            duration_hours: hours,
            score: None,
            note: None,
            group_id: group,
        }
    }

    #[test]
    fn groups_rows_by_case_insensitive_client() {
        let lessons = vec![
            lesson("Mario", "Rossi", 2.0, None),
            lesson("Anna", "Bianchi", 1.0, None),
            lesson("mario", "ROSSI", 1.5, None),
        ];

        let clients = summarize_clients(&lessons);

        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].key, ClientKey::new("Mario", "Rossi"));
        assert_eq!(clients[0].first_name, "Mario", "first spelling wins");
        assert_eq!(clients[0].total_hours, 3.5);
        assert_eq!(clients[0].lesson_count, 2);
        assert_eq!(clients[0].initials(), "MR");
        assert_eq!(clients[1].total_hours, 1.0);
    }

    #[test]
    fn client_hours_count_a_shared_group_once() {
        let group = Uuid::new_v4();
        let lessons = vec![
            lesson("Mario", "Rossi", 2.0, Some(group)),
            lesson("Mario", "Rossi", 2.0, Some(group)),
            lesson("Mario", "Rossi", 1.0, None),
        ];

        let clients = summarize_clients(&lessons);

        assert_eq!(clients[0].total_hours, 3.0);
    }

    #[test]
    fn history_keeps_fetched_order() {
        let lessons = vec![
            lesson("Mario", "Rossi", 2.0, None),
            lesson("Anna", "Bianchi", 1.0, None),
            lesson("MARIO", "rossi", 1.5, None),
        ];

        let history = client_history(&lessons, &ClientKey::parse("mario-rossi"));

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, lessons[0].id);
        assert_eq!(history[1].id, lessons[2].id);
    }

    #[test]
    fn suggestions_match_first_name_fragment() {
        let known = distinct_client_names(vec![
            ClientName::new("Mario", "Rossi"),
            ClientName::new("mario", "rossi"),
            ClientName::new("Marianna", "Verdi"),
            ClientName::new("Anna", "Bianchi"),
        ]);

        let suggestions = suggest_clients(&known, "MAR");

        assert_eq!(known.len(), 3);
        assert_eq!(
            suggestions,
            vec![&ClientName::new("Mario", "Rossi"), &ClientName::new("Marianna", "Verdi")]
        );
        assert!(suggest_clients(&known, "  ").is_empty());
    }

    #[test]
    fn back_navigation_is_linear() {
        let client = ClientKey::new("Mario", "Rossi");
        let lesson = Uuid::new_v4();

        let view = ClientsView::List
            .open_client(client.clone())
            .open_lesson(lesson);
        assert_eq!(
            view,
            ClientsView::Detail {
                client: client.clone(),
                lesson
            }
        );

        let view = view.back().unwrap();
        assert_eq!(view, ClientsView::History { client });

        let view = view.back().unwrap();
        assert_eq!(view, ClientsView::List);
        assert_eq!(view.back(), None);
    }

    #[test]
    fn a_lesson_needs_a_client_first() {
        assert_eq!(ClientsView::List.open_lesson(Uuid::new_v4()), ClientsView::List);
        assert_eq!(ClientsView::select(None, Some(Uuid::new_v4())), ClientsView::List);
    }
}
