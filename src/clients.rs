use anyhow::{anyhow, Context, Result};
use masterski::clients::{client_history, summarize_clients, ClientsView};
use masterski::lessons::fetch_lessons;
use masterski::{Backend, ClientKey, Lesson};
use uuid::Uuid;

pub async fn show(
    backend: &dyn Backend,
    user_id: Uuid,
    client: Option<String>,
    lesson: Option<Uuid>,
) -> Result<()> {
    let lessons = fetch_lessons(backend, user_id)
        .await
        .context("loading lessons")?;
    let view = ClientsView::select(client.as_deref().map(ClientKey::parse), lesson);

    match &view {
        ClientsView::List => print_list(&lessons),
        ClientsView::History { client } => print_history(&lessons, client)?,
        ClientsView::Detail { client, lesson } => print_detail(&lessons, client, *lesson)?,
    }

    println!();
    println!("{}", back_hint(view));

    Ok(())
}

fn print_list(lessons: &[Lesson]) {
    let clients = summarize_clients(lessons);

    if clients.is_empty() {
        println!("No clients yet. Add a lesson with `masterski lesson add`.");
        return;
    }

    for client in clients {
        println!(
            "[{}] {} {}  {}h in {} lesson(s)  ({})",
            client.initials(),
            client.first_name,
            client.last_name,
            client.total_hours,
            client.lesson_count,
            client.key
        );
    }
}

fn print_history(lessons: &[Lesson], client: &ClientKey) -> Result<()> {
    let history = client_history(lessons, client);
    let first = history
        .first()
        .ok_or_else(|| anyhow!("no lessons found for client {client}"))?;

    println!("{}", first.client_name());
    for lesson in history {
        let kind = if lesson.group_id.is_some() { "group" } else { "private" };
        println!(
            "{}  {}h  {kind}  score {}  ({})",
            lesson.date,
            lesson.duration_hours,
            lesson
                .score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "-".to_owned()),
            lesson.id
        );
    }

    Ok(())
}

fn print_detail(lessons: &[Lesson], client: &ClientKey, lesson_id: Uuid) -> Result<()> {
    let lesson = client_history(lessons, client)
        .into_iter()
        .find(|lesson| lesson.id == lesson_id)
        .ok_or_else(|| anyhow!("lesson {lesson_id} not found for client {client}"))?;

    println!("Client:     {}", lesson.client_name());
    println!("Date:       {}", lesson.date);
    if let Some(start_time) = lesson.start_time {
        println!("Start:      {}", start_time.format("%H:%M"));
    }
    println!("Duration:   {}h", lesson.duration_hours);
    println!(
        "Score:      {}",
        lesson
            .score
            .map(|score| format!("{score}/10"))
            .unwrap_or_else(|| "-".to_owned())
    );
    if let Some(group_id) = lesson.group_id {
        println!("Group:      {group_id}");
    }
    if let Some(note) = &lesson.note {
        println!("Note:       {note}");
    }

    Ok(())
}

fn back_hint(view: ClientsView) -> String {
    match view.back() {
        Some(ClientsView::History { client }) => {
            format!("Back: masterski clients --client {client}")
        }
        Some(_) => "Back: masterski clients".to_owned(),
        None => "Back: masterski stats".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_hint_walks_one_level_up() {
        let client = ClientKey::new("Mario", "Rossi");
        let lesson = Uuid::new_v4();

        assert_eq!(
            back_hint(ClientsView::select(Some(client.clone()), Some(lesson))),
            "Back: masterski clients --client mario-rossi"
        );
        assert_eq!(
            back_hint(ClientsView::select(Some(client), None)),
            "Back: masterski clients"
        );
        assert_eq!(back_hint(ClientsView::List), "Back: masterski stats");
    }
}
