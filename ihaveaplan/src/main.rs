mod session_store;

use anyhow::{Context, Result, bail};
use assistant_client::{
    AssistantApi, Chapter, Config, FileUpload, OpenAiClient, PlanError, Prerequisite,
    SessionState, clear_everything, clear_session, create_assistant, extract_chapters, get_api,
    upload_document, validate_api_key,
};
use clap::{Parser, Subcommand};
use log::{debug, warn};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "ihaveaplan",
    about = "Turn a book into a chapter plan",
    long_about = "Uploads a document to a hosted retrieval assistant and asks it for the book's chapter list"
)]
#[command(version)]
struct Args {
    /// Enable debug mode for verbose output
    #[arg(short, long, default_value_t = false, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check an API key and remember it for this session
    Validate {
        /// Key to check (defaults to the configured key)
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Upload a document and index it for retrieval
    Upload {
        /// Document to upload
        file: PathBuf,
    },
    /// Create the assistant over the uploaded document
    CreateAssistant,
    /// Ask the assistant for the chapter list
    Chapters {
        /// Print chapters as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate, upload, create the assistant and extract chapters in one go
    Plan {
        /// Document to plan
        file: PathBuf,
        /// Print chapters as JSON
        #[arg(long)]
        json: bool,
        /// Keep the remote resources instead of deleting them afterwards
        #[arg(long)]
        keep: bool,
    },
    /// Delete the resources created by this session
    Clear,
    /// Delete EVERY assistant, file and vector store on the account
    ClearEverything {
        /// Confirm the account-wide deletion
        #[arg(long)]
        yes: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Store the API key in the config file
    SetKey {
        /// API key
        key: String,
    },
    /// Change how runs are polled
    SetPoll {
        /// Milliseconds between run status checks
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Give up after this many checks (0 waits forever)
        #[arg(long)]
        max_attempts: Option<u32>,
    },
}

/// Handle config subcommands
fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut config = Config::load()?;
            let path = Config::config_path()?;
            if config.api_key.is_some() {
                config.api_key = Some("<redacted>".to_string());
            }
            println!("Config file: {}", path.display());
            println!("Session file: {}", session_store::session_path()?.display());
            println!();
            println!("{:#?}", config);
        }
        ConfigAction::SetKey { key } => {
            let mut config = Config::load()?;
            config.api_key = Some(key.clone());
            config.save()?;
            println!("API key saved to {}", Config::config_path()?.display());
        }
        ConfigAction::SetPoll {
            interval_ms,
            max_attempts,
        } => {
            let mut config = Config::load()?;
            if let Some(interval_ms) = interval_ms {
                config.poll.interval_ms = *interval_ms;
            }
            if let Some(max_attempts) = max_attempts {
                config.poll.max_attempts = (*max_attempts > 0).then_some(*max_attempts);
            }
            config.save()?;
            println!(
                "Polling every {} ms, {}",
                config.poll.interval_ms,
                match config.poll.max_attempts {
                    Some(n) => format!("giving up after {} checks", n),
                    None => "without a limit".to_string(),
                }
            );
        }
    }
    Ok(())
}

/// Build a client from the session's key, falling back to the configured one
fn connect(config: &Config, session: &SessionState) -> Result<OpenAiClient> {
    let key = session
        .api_key
        .clone()
        .or_else(|| config.resolve_api_key())
        .ok_or(PlanError::MissingPrerequisite(Prerequisite::ApiKey))
        .context("Run `ihaveaplan validate` or `ihaveaplan config set-key` first")?;
    Ok(get_api(config, &key))
}

/// Read a document from disk for upload
fn read_upload(path: &Path) -> Result<FileUpload> {
    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .context("Invalid filename")?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(FileUpload::for_assistants(file_name, bytes))
}

fn print_chapters(chapters: &[Chapter], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chapters)?);
        return Ok(());
    }

    if chapters.is_empty() {
        println!("No chapters found");
    }
    for chapter in chapters {
        println!("{}", chapter.name);
    }
    Ok(())
}

async fn validate(config: &Config, session: &mut SessionState, key: Option<String>) -> Result<()> {
    let key = key
        .or_else(|| config.resolve_api_key())
        .unwrap_or_default();
    let api = get_api(config, &key);

    if !validate_api_key(&api, &key, session).await? {
        bail!("No API key given. Pass --key or run `ihaveaplan config set-key`");
    }
    Ok(())
}

async fn plan(
    api: &dyn AssistantApi,
    config: &Config,
    session: &mut SessionState,
    file: &Path,
    keep: bool,
) -> Result<Vec<Chapter>> {
    upload_document(api, &config.assistant, session, read_upload(file)?)
        .await
        .context("Upload failed")?;
    create_assistant(api, &config.assistant, session).await?;

    let chapters = extract_chapters(api, session, &config.poll.policy()).await;

    if !keep {
        debug!("Removing remote resources");
        let cleanup = clear_session(api, session).await;
        if let (Err(e), Err(_)) = (&chapters, &cleanup) {
            warn!("Chapter extraction failed: {}", e);
        }
        cleanup.context("Failed to clean up remote resources")?;
    }

    Ok(chapters?)
}

async fn run(args: Args, config: Config, session: &mut SessionState) -> Result<()> {
    match args.command {
        Commands::Config { .. } => unreachable!("config commands run before the session is loaded"),
        Commands::Validate { key } => {
            validate(&config, session, key).await?;
            println!("API key is valid");
        }
        Commands::Upload { file } => {
            let api = connect(&config, session)?;
            upload_document(&api, &config.assistant, session, read_upload(&file)?).await?;
            println!(
                "Uploaded {} (vector store {})",
                file.display(),
                session.vector_store_id.as_deref().unwrap_or("-")
            );
        }
        Commands::CreateAssistant => {
            let api = connect(&config, session)?;
            create_assistant(&api, &config.assistant, session).await?;
            println!(
                "Created assistant {}",
                session.assistant_id.as_deref().unwrap_or("-")
            );
        }
        Commands::Chapters { json } => {
            let api = connect(&config, session)?;
            let chapters = extract_chapters(&api, session, &config.poll.policy()).await?;
            print_chapters(&chapters, json)?;
        }
        Commands::Plan { file, json, keep } => {
            if session.api_key.is_none() {
                validate(&config, session, None).await?;
            }
            let api = connect(&config, session)?;
            let chapters = plan(&api, &config, session, &file, keep).await?;
            print_chapters(&chapters, json)?;
        }
        Commands::Clear => {
            let api = connect(&config, session)?;
            clear_session(&api, session).await?;
            println!("Session resources deleted");
        }
        Commands::ClearEverything { yes } => {
            if !yes {
                bail!("This deletes every assistant, file and vector store on the account. Re-run with --yes");
            }
            let api = connect(&config, session)?;
            let report = clear_everything(&api, session).await?;
            println!(
                "Deleted {} assistant(s), {} file(s), {} vector store(s){}",
                report.assistants,
                report.files,
                report.vector_stores,
                if report.thread { " and the session thread" } else { "" }
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Handle config subcommands first (before touching the session)
    if let Commands::Config { action } = &args.command {
        return handle_config_command(action);
    }

    let config = Config::load().context("Failed to load configuration")?;
    let mut session = session_store::load()?;
    debug!("Loaded session: {:?}", session);

    // Persist whatever was recorded, even when the command failed partway
    let result = run(args, config, &mut session).await;
    session_store::save(&session)?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_client::{ApiError, MockAssistantApi};

    fn server_error() -> ApiError {
        ApiError::Status {
            status_code: 500,
            message: "boom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_plan_cleanup_failure_after_failed_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("book.txt");
        std::fs::write(&file, "1. Intro").unwrap();

        let api = MockAssistantApi::new()
            .fail_on("create_run", server_error())
            .fail_on("delete_assistant", server_error());
        let mut session = SessionState::with_api_key("sk-test");

        let err = plan(&api, &Config::default(), &mut session, &file, false)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).starts_with("Failed to clean up remote resources"));
        assert_eq!(session.assistant_id.as_deref(), Some("asst_1"));
        assert_eq!(api.call_count("create_run"), 1);
    }

    #[tokio::test]
    async fn test_plan_keep_skips_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("book.txt");
        std::fs::write(&file, "1. Intro").unwrap();

        let api = MockAssistantApi::new()
            .with_run_statuses(vec![assistant_client::RunStatus::Completed])
            .with_reply("1. Intro\n2. Body");
        let mut session = SessionState::with_api_key("sk-test");

        let chapters = plan(&api, &Config::default(), &mut session, &file, true)
            .await
            .unwrap();

        assert_eq!(chapters.len(), 2);
        assert_eq!(api.call_count("delete_assistant"), 0);
        assert_eq!(session.assistant_id.as_deref(), Some("asst_1"));
    }
}
