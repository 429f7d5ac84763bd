//! Command-line client for the Skit0 script-augmentation backend.
//!
//! Drives the `skit0-client` library the way the web pages drive the
//! browser client: auth commands feed the session store, project and
//! augment commands require a restored session, and destructive actions
//! confirm before any request is issued.

use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use skit0_client::net::{ApiClient, ApiError, DEFAULT_BASE_URL};
use skit0_client::session::SessionStore;
use skit0_client::storage::{FileStorage, SessionStorage};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not signed in; run `skit0 auth login` first")]
    NotSignedIn,
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{message}")]
    Operation { message: &'static str },
    #[error("Project title is required")]
    EmptyTitle,
    #[error("Please write some content first")]
    EmptyScript,
    #[error("input read failed: {0}")]
    Input(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Map an API failure to the fixed per-command message shown to the user.
/// The backend's own string still lands in the debug log.
fn operation(message: &'static str) -> impl FnOnce(ApiError) -> CliError {
    move |error| {
        tracing::debug!(detail = %error, message, "api call failed");
        CliError::Operation { message }
    }
}

#[derive(Parser, Debug)]
#[command(name = "skit0-cli", about = "Skit0 script-augmentation API CLI")]
struct Cli {
    /// Backend base URL.
    #[arg(long, env = "SKIT0_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Session file path. Defaults to `skit0/session.json` under the user
    /// config directory.
    #[arg(long, env = "SKIT0_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in, sign up, sign out, or show the current session.
    Auth(AuthCommand),
    /// Manage script projects.
    Project(ProjectCommand),
    /// Keyword extraction and image search.
    Augment(AugmentCommand),
}

#[derive(Args, Debug)]
struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuthSubcommand {
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with existing credentials.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Clear the local session. The backend is notified best-effort.
    Logout,
    /// Show the signed-in user.
    Whoami,
}

#[derive(Args, Debug)]
struct ProjectCommand {
    #[command(subcommand)]
    command: ProjectSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProjectSubcommand {
    /// List your projects.
    List,
    /// Show one project.
    Show { project_id: i64 },
    /// Create a project.
    Create {
        #[arg(long)]
        title: String,
        /// Initial script content, inline.
        #[arg(long, conflicts_with = "input")]
        content: Option<String>,
        /// Initial script content from a file path, or - for stdin.
        #[arg(long)]
        input: Option<String>,
    },
    /// Save a project's title and/or script content.
    Update {
        project_id: i64,
        #[arg(long)]
        title: Option<String>,
        /// Replacement script content, inline.
        #[arg(long, conflicts_with = "input")]
        content: Option<String>,
        /// Replacement script content from a file path, or - for stdin.
        #[arg(long)]
        input: Option<String>,
    },
    /// Delete a project after confirmation.
    Delete {
        project_id: i64,
        /// Skip the confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct AugmentCommand {
    #[command(subcommand)]
    command: AugmentSubcommand,
}

#[derive(Subcommand, Debug)]
enum AugmentSubcommand {
    /// Extract keywords from script content and fetch matching images.
    Images {
        /// Project whose saved content to augment.
        #[arg(long, required_unless_present = "input")]
        project_id: Option<i64>,
        /// Script content from a file path, or - for stdin. Overrides the
        /// project's saved content.
        #[arg(long)]
        input: Option<String>,
    },
    /// Fetch images for a single keyword.
    Search { keyword: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let path = cli.session_file.unwrap_or_else(FileStorage::default_path);
    let storage: Arc<dyn SessionStorage> = Arc::new(FileStorage::open(path));
    let api = ApiClient::new(&cli.base_url, Arc::clone(&storage));
    let mut session = SessionStore::new(Arc::clone(&storage));
    session.restore();

    match cli.command {
        Command::Auth(auth) => run_auth(&api, &mut session, auth).await,
        Command::Project(project) => run_project(&api, &session, project).await,
        Command::Augment(augment) => run_augment(&api, &session, augment).await,
    }
}

async fn run_auth(
    api: &ApiClient,
    session: &mut SessionStore,
    auth: AuthCommand,
) -> Result<(), CliError> {
    match auth.command {
        AuthSubcommand::Register { email, username, password } => {
            session.register(api, &email, &username, &password).await?;
            greet(session);
            Ok(())
        }
        AuthSubcommand::Login { email, password } => {
            session.login(api, &email, &password).await?;
            greet(session);
            Ok(())
        }
        AuthSubcommand::Logout => {
            // Local teardown happens regardless of the server's answer.
            let _ = api.logout().await;
            session.logout();
            eprintln!("Signed out");
            Ok(())
        }
        AuthSubcommand::Whoami => {
            let Some(user) = session.user() else {
                eprintln!("Not signed in");
                return Ok(());
            };
            print_json(user)
        }
    }
}

async fn run_project(
    api: &ApiClient,
    session: &SessionStore,
    project: ProjectCommand,
) -> Result<(), CliError> {
    require_session(session)?;
    match project.command {
        ProjectSubcommand::List => {
            let projects = api.projects().await.map_err(operation("Failed to load projects"))?;
            print_json(&projects)
        }
        ProjectSubcommand::Show { project_id } => {
            let project =
                api.project(project_id).await.map_err(operation("Failed to load project"))?;
            print_json(&project)
        }
        ProjectSubcommand::Create { title, content, input } => {
            if title.trim().is_empty() {
                return Err(CliError::EmptyTitle);
            }
            let content = resolve_content(content, input.as_deref())?;
            let project = api
                .create_project(&title, content.as_deref())
                .await
                .map_err(operation("Failed to create project"))?;
            eprintln!("Project created!");
            print_json(&project)
        }
        ProjectSubcommand::Update { project_id, title, content, input } => {
            if title.as_deref().is_some_and(|title| title.trim().is_empty()) {
                return Err(CliError::EmptyTitle);
            }
            let content = resolve_content(content, input.as_deref())?;
            let project = api
                .update_project(project_id, title.as_deref(), content.as_deref())
                .await
                .map_err(operation("Failed to save project"))?;
            eprintln!("Project saved!");
            print_json(&project)
        }
        ProjectSubcommand::Delete { project_id, yes } => {
            // Confirm before anything reaches the wire; declining must
            // leave the backend untouched.
            if !yes && !confirm_delete(project_id)? {
                eprintln!("Cancelled");
                return Ok(());
            }
            api.delete_project(project_id)
                .await
                .map_err(operation("Failed to delete project"))?;
            eprintln!("Project deleted");
            Ok(())
        }
    }
}

async fn run_augment(
    api: &ApiClient,
    session: &SessionStore,
    augment: AugmentCommand,
) -> Result<(), CliError> {
    require_session(session)?;
    match augment.command {
        AugmentSubcommand::Images { project_id, input } => {
            let content = match input {
                Some(input) => read_input(&input)?,
                None => {
                    let Some(project_id) = project_id else {
                        return Err(CliError::EmptyScript);
                    };
                    let project = api
                        .project(project_id)
                        .await
                        .map_err(operation("Failed to load project"))?;
                    project.script_content.unwrap_or_default()
                }
            };
            if content.trim().is_empty() {
                return Err(CliError::EmptyScript);
            }
            let augmentation = api
                .augment_images(&content, project_id)
                .await
                .map_err(operation("Failed to augment images"))?;
            eprintln!("Found {} keywords!", augmentation.keywords.len());
            print_json(&augmentation)
        }
        AugmentSubcommand::Search { keyword } => {
            let images =
                api.search_keyword(&keyword).await.map_err(operation("Failed to search images"))?;
            print_json(&images)
        }
    }
}

fn require_session(session: &SessionStore) -> Result<(), CliError> {
    if session.is_authenticated() { Ok(()) } else { Err(CliError::NotSignedIn) }
}

fn greet(session: &SessionStore) {
    if let Some(user) = session.user() {
        eprintln!("Signed in as {}", user.username);
    }
}

/// Pick script content from the inline flag or the input file, if either
/// was given.
fn resolve_content(
    content: Option<String>,
    input: Option<&str>,
) -> Result<Option<String>, CliError> {
    if content.is_some() {
        return Ok(content);
    }
    input.map(read_input).transpose()
}

fn read_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin().lock().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}

fn confirm_delete(project_id: i64) -> Result<bool, CliError> {
    eprint!("Delete project {project_id}? [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
