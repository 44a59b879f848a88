use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use masterski::{BackendError, HourlyRate, Preferences};
use secrecy::SecretString;
use tracing::{debug, error, warn};
use uuid::Uuid;

mod auth;
mod clients;
mod config;
mod dashboard;
mod feed;
mod lessons;
mod logging;
mod profile;
mod supabase;

use auth::{AuthClient, Session, SessionStore, SignUpOutcome};
use config::{BackendArgs, BackendConfig, StatePaths};
use lessons::StudentArg;
use supabase::SupabaseClient;

/// Lesson bookkeeping and the instructors' feed.
#[derive(Parser)]
#[clap(name = "masterski", version)]
struct MasterSki {
    #[clap(flatten)]
    backend: BackendArgs,

    /// Directory holding preferences and the signed-in session.
    #[clap(long, env = "MASTERSKI_STATE_DIR", value_parser, value_name = "PATH")]
    state_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[clap(long, default_value = "warn", value_name = "FILTER")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[clap(long)]
    log_json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password.
    Login {
        #[clap(long, value_parser)]
        email: String,

        #[clap(long, env = "MASTERSKI_PASSWORD", hide_env_values = true, value_parser)]
        password: String,
    },

    /// Create an account.
    Signup {
        #[clap(long, value_parser)]
        email: String,

        #[clap(long, env = "MASTERSKI_PASSWORD", hide_env_values = true, value_parser)]
        password: String,

        #[clap(long, value_parser)]
        first_name: String,

        #[clap(long, value_parser)]
        last_name: String,
    },

    Logout,

    /// Hours taught, average score, clients and earnings.
    Stats,

    /// Show or set the hourly rate used for earnings.
    Rate {
        #[clap(value_parser, value_name = "EUROS")]
        value: Option<HourlyRate>,
    },

    /// Client list, one client's lessons, or one lesson.
    Clients {
        #[clap(long, value_parser, value_name = "KEY")]
        client: Option<String>,

        #[clap(long, value_parser, value_name = "ID", requires = "client")]
        lesson: Option<Uuid>,
    },

    Lesson {
        #[clap(subcommand)]
        command: LessonCommand,
    },

    /// Latest posts, newest first.
    Feed {
        /// Only my posts.
        #[clap(long, conflicts_with = "author")]
        mine: bool,

        #[clap(long, value_parser, value_name = "USER_ID")]
        author: Option<Uuid>,
    },

    /// Publish a post with text, an image and/or a poll.
    Post {
        #[clap(long, value_parser, default_value = "")]
        text: String,

        #[clap(long, value_parser, value_name = "PATH")]
        image: Option<PathBuf>,

        #[clap(long, value_parser, value_name = "QUESTION")]
        poll_question: Option<String>,

        #[clap(
            long = "poll-option",
            value_parser,
            value_name = "TEXT",
            requires = "poll-question"
        )]
        poll_options: Vec<String>,
    },

    Comments {
        #[clap(value_parser)]
        post_id: i64,
    },

    Comment {
        #[clap(value_parser)]
        post_id: i64,

        #[clap(value_parser)]
        text: String,
    },

    /// Vote on a poll; options are numbered from 1.
    Vote {
        #[clap(value_parser)]
        poll_id: i64,

        #[clap(value_parser)]
        option: usize,
    },

    Profile {
        #[clap(subcommand)]
        command: ProfileCommand,
    },
}

#[derive(Subcommand)]
enum LessonCommand {
    /// Record a lesson for one or more students.
    Add {
        #[clap(long, value_parser, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,

        #[clap(long, value_parser, value_name = "HH:MM:SS")]
        start: Option<NaiveTime>,

        #[clap(long, value_parser, value_name = "HOURS")]
        duration: f64,

        /// First,Last[,score[,note]]; repeat for group lessons.
        #[clap(long = "student", value_parser, required = true)]
        students: Vec<StudentArg>,
    },

    /// Past clients whose first name contains the text.
    Suggest {
        #[clap(value_parser)]
        fragment: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// My profile, or another instructor's header and posts.
    Show {
        #[clap(long, value_parser, value_name = "USER_ID")]
        user: Option<Uuid>,
    },

    Edit {
        #[clap(long, value_parser)]
        first_name: Option<String>,

        #[clap(long, value_parser)]
        last_name: Option<String>,

        #[clap(long, value_parser)]
        instagram: Option<String>,

        #[clap(long, value_parser)]
        facebook: Option<String>,

        #[clap(long, value_parser)]
        bio: Option<String>,
    },

    Username {
        #[clap(value_parser)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "env-file")]
    dotenvy::dotenv().ok();

    let master_ski = MasterSki::parse();
    logging::init(&master_ski.log_level, master_ski.log_json);

    run(master_ski).await
}

async fn run(master_ski: MasterSki) -> Result<()> {
    let paths = StatePaths::resolve(master_ski.state_dir)?;
    debug!(state_dir = %paths.dir().display(), "resolved state directory");

    let sessions = SessionStore::new(paths.session());

    match master_ski.command {
        Command::Rate { value } => return dashboard::hourly_rate(&paths.preferences(), value),
        Command::Logout => {
            let auth = match BackendConfig::from_args(&master_ski.backend) {
                Ok(config) => Some(AuthClient::new(&config).context("building HTTP client")?),
                Err(error) => {
                    warn!(%error, "no backend configured, only the local session is cleared");
                    None
                }
            };

            logout(&sessions, auth.as_ref()).await?;
            println!("Signed out");

            return Ok(());
        }
        _ => {}
    }

    let config = BackendConfig::from_args(&master_ski.backend)?;
    let auth = AuthClient::new(&config).context("building HTTP client")?;

    match master_ski.command {
        Command::Login { email, password } => {
            let session = auth
                .sign_in(&email, &SecretString::new(password))
                .await
                .context("signing in")?;
            sessions.save(&session)?;
            println!("Signed in as {}", session.email.as_deref().unwrap_or(&email));
        }
        Command::Signup {
            email,
            password,
            first_name,
            last_name,
        } => {
            let outcome = auth
                .sign_up(&email, &SecretString::new(password), &first_name, &last_name)
                .await
                .context("signing up")?;

            match outcome {
                SignUpOutcome::SignedIn(session) => {
                    sessions.save(&session)?;
                    println!("Account created, signed in as {email}");
                }
                SignUpOutcome::ConfirmationPending { user_id } => {
                    debug!(%user_id, "sign-up awaiting confirmation");
                    println!("Account created, check {email} to confirm it before signing in");
                }
            }
        }
        command => {
            let session = current_session(&auth, &sessions).await?;
            let backend = SupabaseClient::new(&config)
                .context("building HTTP client")?
                .with_access_token(session.access_token.clone());

            signed_in(command, &backend, session.user_id, &paths).await?;
        }
    }

    Ok(())
}

/// Ends the session remotely when a backend is at hand; the local session is
/// always cleared.
async fn logout(sessions: &SessionStore, auth: Option<&AuthClient>) -> Result<()> {
    if let Some(auth) = auth {
        match sessions.load() {
            Ok(Some(session)) => {
                if let Err(error) = auth.sign_out(&session).await {
                    error!(%error, "remote sign-out failed, clearing the local session anyway");
                }
            }
            Ok(None) => {}
            Err(error) => warn!("unreadable session, clearing it: {error:#}"),
        }
    }

    sessions.clear()
}

/// The stored session, refreshed first when it is about to expire.
async fn current_session(auth: &AuthClient, sessions: &SessionStore) -> Result<Session> {
    let session = sessions
        .load()?
        .ok_or(BackendError::Unauthenticated)
        .context("run `masterski login` first")?;

    if !session.needs_refresh(Utc::now()) {
        return Ok(session);
    }

    let session = auth
        .refresh(&session)
        .await
        .context("refreshing session, run `masterski login` again")?;
    sessions.save(&session)?;

    Ok(session)
}

async fn signed_in(
    command: Command,
    backend: &SupabaseClient,
    user_id: Uuid,
    paths: &StatePaths,
) -> Result<()> {
    match command {
        Command::Stats => {
            let preferences = Preferences::load(&paths.preferences())?;
            dashboard::show_stats(backend, user_id, &preferences).await
        }
        Command::Clients { client, lesson } => {
            clients::show(backend, user_id, client, lesson).await
        }
        Command::Lesson {
            command:
                LessonCommand::Add {
                    date,
                    start,
                    duration,
                    students,
                },
        } => {
            let lesson = lessons::NewLesson {
                date: date.unwrap_or_else(|| chrono::Local::now().date_naive()),
                start_time: start,
                duration_hours: duration,
                students,
            };
            lessons::add(backend, user_id, lesson).await
        }
        Command::Lesson {
            command: LessonCommand::Suggest { fragment },
        } => lessons::suggest(backend, user_id, &fragment).await,
        Command::Feed { mine, author } => {
            let author = if mine { Some(user_id) } else { author };
            feed::show_feed(backend, user_id, author).await
        }
        Command::Post {
            text,
            image,
            poll_question,
            poll_options,
        } => {
            let post = feed::NewPost {
                text,
                image: image.as_deref(),
                poll_question,
                poll_options,
            };
            feed::publish(backend, user_id, post).await
        }
        Command::Comments { post_id } => feed::show_comments(backend, post_id).await,
        Command::Comment { post_id, text } => feed::comment(backend, user_id, post_id, &text).await,
        Command::Vote { poll_id, option } => feed::vote(backend, user_id, poll_id, option).await,
        Command::Profile { command } => match command {
            ProfileCommand::Show { user: None } => profile::show(backend, user_id).await,
            ProfileCommand::Show { user: Some(author) } => {
                profile::show_author(backend, user_id, author).await
            }
            ProfileCommand::Edit {
                first_name,
                last_name,
                instagram,
                facebook,
                bio,
            } => {
                let update = profile::DetailsUpdate {
                    first_name,
                    last_name,
                    instagram,
                    facebook,
                    bio,
                };
                profile::edit(backend, user_id, update).await
            }
            ProfileCommand::Username { username } => {
                profile::username(backend, user_id, &username).await
            }
        },
        Command::Login { .. } | Command::Signup { .. } | Command::Logout | Command::Rate { .. } => {
            bail!("this command runs without a session")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> MasterSki {
        MasterSki::try_parse_from(std::iter::once("masterski").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn parses_group_lesson() {
        let master_ski = parse(&[
            "lesson",
            "add",
            "--date",
            "2025-02-03",
            "--start",
            "10:00:00",
            "--duration",
            "2",
            "--student",
            "Mario,Rossi,8",
            "--student",
            "Anna,Bianchi",
        ]);

        match master_ski.command {
            Command::Lesson {
                command:
                    LessonCommand::Add {
                        date,
                        start,
                        duration,
                        students,
                    },
            } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 3));
                assert_eq!(start, NaiveTime::from_hms_opt(10, 0, 0));
                assert_eq!(duration, 2.0);
                assert_eq!(students.len(), 2);
                assert_eq!(students[0].0.score, 8);
            }
            _ => panic!("expected lesson add"),
        }
    }

    #[test]
    fn parses_rate_and_rejects_negative() {
        match parse(&["rate", "45"]).command {
            Command::Rate { value } => assert_eq!(value.map(HourlyRate::value), Some(45.0)),
            _ => panic!("expected rate"),
        }

        assert!(MasterSki::try_parse_from(["masterski", "rate", "--", "-5"]).is_err());
    }

    #[test]
    fn lesson_detail_needs_a_client() {
        let lesson = Uuid::new_v4().to_string();

        assert!(MasterSki::try_parse_from(["masterski", "clients", "--lesson", &lesson]).is_err());
    }

    #[test]
    fn command_definitions_are_consistent() {
        use clap::CommandFactory;

        MasterSki::command().debug_assert();
    }

    #[test]
    fn poll_option_needs_a_question() {
        assert!(MasterSki::try_parse_from(["masterski", "post", "--poll-option", "A"]).is_err());
        assert!(MasterSki::try_parse_from(["masterski", "post", "--text", "powder"]).is_ok());
    }

    #[test]
    fn profile_show_takes_an_optional_user() {
        let author = Uuid::new_v4();

        match parse(&["profile", "show", "--user", &author.to_string()]).command {
            Command::Profile {
                command: ProfileCommand::Show { user },
            } => assert_eq!(user, Some(author)),
            _ => panic!("expected profile show"),
        }

        match parse(&["profile", "show"]).command {
            Command::Profile {
                command: ProfileCommand::Show { user },
            } => assert_eq!(user, None),
            _ => panic!("expected profile show"),
        }
    }

    #[tokio::test]
    async fn logout_without_a_backend_clears_the_local_session() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::new(dir.path().join("session.json"));
        sessions
            .save(&Session {
                user_id: Uuid::new_v4(),
                email: None,
                access_token: SecretString::new("access".to_owned()),
                refresh_token: SecretString::new("refresh".to_owned()),
                expires_at: Utc::now(),
            })
            .unwrap();

        logout(&sessions, None).await.unwrap();

        assert!(sessions.load().unwrap().is_none());
        logout(&sessions, None).await.unwrap();
    }

    #[test]
    fn poll_options_accumulate() {
        match parse(&[
            "post",
            "--poll-question",
            "Best slope?",
            "--poll-option",
            "Ventina",
            "--poll-option",
            "Matterhorn",
        ])
        .command
        {
            Command::Post {
                text,
                poll_question,
                poll_options,
                ..
            } => {
                assert_eq!(text, "");
                assert_eq!(poll_question.as_deref(), Some("Best slope?"));
                assert_eq!(poll_options, ["Ventina", "Matterhorn"]);
            }
            _ => panic!("expected post"),
        }
    }
}
