use anyhow::{Context, Result};
use chrono::Utc;
use masterski::profiles::{
    claim_username, fetch_author_page, fetch_profile, fetch_profile_details, save_profile_details,
};
use masterski::{Backend, Profile, ProfileDetails};
use uuid::Uuid;

use crate::feed::print_posts;

pub async fn show(backend: &dyn Backend, user_id: Uuid) -> Result<()> {
    let profile = fetch_profile(backend, user_id)
        .await
        .context("loading profile")?;
    let details = fetch_profile_details(backend, user_id)
        .await
        .context("loading profile details")?;

    match &profile {
        Some(profile) => {
            println!("Name:       {}", profile.display_name().unwrap_or("-"));
            println!("Username:   {}", profile.username.as_deref().unwrap_or("-"));
            println!("Avatar:     {}", profile.avatar());
        }
        None => {
            println!("No public profile yet. Pick a username with `masterski profile username`.")
        }
    }

    for (label, value) in [
        ("First name", &details.first_name),
        ("Last name", &details.last_name),
        ("Instagram", &details.instagram),
        ("Facebook", &details.facebook),
        ("Bio", &details.bio),
    ] {
        println!("{:<11} {}", format!("{label}:"), value.as_deref().unwrap_or("-"));
    }

    Ok(())
}

/// Another instructor's page: their header above their posts.
pub async fn show_author(backend: &dyn Backend, viewer: Uuid, author: Uuid) -> Result<()> {
    let page = fetch_author_page(backend, author)
        .await
        .context("loading author profile")?;

    match &page.profile {
        Some(profile) => {
            for line in header_lines(profile) {
                println!("{line}");
            }
        }
        None => println!("No profile for {author}"),
    }
    println!();

    print_posts(backend, viewer, page.posts).await;

    Ok(())
}

fn header_lines(profile: &Profile) -> Vec<String> {
    let mut lines = vec![
        profile.avatar(),
        profile.display_name().unwrap_or("Unknown user").to_owned(),
    ];

    if let Some(username) = profile.username.as_deref().filter(|name| !name.is_empty()) {
        lines.push(format!("@{username}"));
    }

    lines
}

/// Fields left out keep their stored value; an empty value clears one.
#[derive(Debug, Default)]
pub struct DetailsUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub bio: Option<String>,
}

impl DetailsUpdate {
    fn apply(self, details: &mut ProfileDetails) {
        for (field, update) in [
            (&mut details.first_name, self.first_name),
            (&mut details.last_name, self.last_name),
            (&mut details.instagram, self.instagram),
            (&mut details.facebook, self.facebook),
            (&mut details.bio, self.bio),
        ] {
            if let Some(value) = update {
                let value = value.trim();
                *field = (!value.is_empty()).then(|| value.to_owned());
            }
        }
    }
}

pub async fn edit(backend: &dyn Backend, user_id: Uuid, update: DetailsUpdate) -> Result<()> {
    let mut details = fetch_profile_details(backend, user_id)
        .await
        .context("loading profile details")?;

    update.apply(&mut details);

    save_profile_details(backend, user_id, &details, Utc::now())
        .await
        .context("saving profile details")?;

    println!("Profile saved");

    Ok(())
}

pub async fn username(backend: &dyn Backend, user_id: Uuid, username: &str) -> Result<()> {
    claim_username(backend, user_id, username, Utc::now())
        .await
        .context("updating username")?;

    println!("Username set to {}", username.trim());

    Ok(())
}
