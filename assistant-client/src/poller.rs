//! Asking the assistant for the chapter list and waiting on the run.

use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::sleep;

use crate::api::{AssistantApi, MessageQuery, MessageRequest, Run, RunRequest, RunStatus};
use crate::chapters::{Chapter, parse_chapters};
use crate::error::{Operation, PlanError, Prerequisite, Result};
use crate::session::SessionState;

/// Prompt posted to the thread. The reply format is what [`parse_chapters`] expects.
pub const CHAPTERS_PROMPT: &str = "Generate a lists all chapters of the book, including only the number and name of each chapter. The format should precisely follow these specifications:
1. [Name]
2. [Name]
// Continue with additional chapters as necessary

Ensure that every chapter of the book is represented, with the exact name as it appears in the book.
";

/// Steering instruction attached to the run.
pub const RUN_INSTRUCTIONS: &str = "Generate a list of chapters from the book.";

/// How often to check on a run, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` (or `Some(0)`) waits as long as the run stays pending.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: None,
        }
    }
}

impl PollPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Where a run is in its lifecycle, as far as polling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Queued,
    Running,
    Cancelling,
    Terminal(RunStatus),
}

impl From<RunStatus> for RunPhase {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Queued => Self::Queued,
            RunStatus::InProgress => Self::Running,
            RunStatus::Cancelling => Self::Cancelling,
            other => Self::Terminal(other),
        }
    }
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// Re-fetch `run` every `policy.interval` until it leaves the pending phases.
///
/// Any terminal status ends the wait, including failed and cancelled ones.
pub async fn wait_for_run<A: AssistantApi + ?Sized>(
    api: &A,
    mut run: Run,
    policy: &PollPolicy,
) -> Result<Run> {
    let limit = policy.max_attempts.filter(|&max| max > 0);
    let mut attempts = 0u32;

    while !RunPhase::from(run.status).is_terminal() {
        if limit.is_some_and(|max| attempts >= max) {
            return Err(PlanError::PollTimeout { attempts });
        }

        debug!("Run {} is {:?}, checking again in {:?}", run.id, run.status, policy.interval);
        sleep(policy.interval).await;
        run = api
            .retrieve_run(&run.thread_id, &run.id)
            .await
            .map_err(PlanError::remote(Operation::RetrieveRun))?;
        attempts += 1;
    }

    if run.status != RunStatus::Completed {
        warn!("Run {} ended as {:?}; reading latest message anyway", run.id, run.status);
    }

    Ok(run)
}

async fn ask_in_thread<A: AssistantApi + ?Sized>(
    api: &A,
    thread_id: &str,
    assistant_id: &str,
    policy: &PollPolicy,
) -> Result<String> {
    api.create_message(thread_id, &MessageRequest::user(CHAPTERS_PROMPT))
        .await
        .map_err(PlanError::remote(Operation::CreateMessage))?;

    let request = RunRequest {
        assistant_id: assistant_id.to_string(),
        instructions: RUN_INSTRUCTIONS.to_string(),
    };
    let run = api
        .create_run(thread_id, &request)
        .await
        .map_err(PlanError::remote(Operation::CreateRun))?;
    info!("Started run {} on thread {}", run.id, thread_id);

    let run = wait_for_run(api, run, policy).await?;

    let messages = api
        .list_messages(&run.thread_id, MessageQuery::latest())
        .await
        .map_err(PlanError::remote(Operation::ListMessages))?;

    let message = messages
        .data
        .into_iter()
        .next()
        .ok_or(PlanError::NoDataReturned)?;

    Ok(message.text())
}

/// Run the chapter prompt against the session's assistant and return the raw reply.
///
/// A fresh thread is created for the question and deleted afterwards whether
/// or not the question succeeded. The session's `thread_id` is left alone.
pub async fn fetch_reply<A: AssistantApi + ?Sized>(
    api: &A,
    session: &SessionState,
    policy: &PollPolicy,
) -> Result<String> {
    let assistant_id = session
        .assistant_id
        .as_deref()
        .ok_or(PlanError::MissingPrerequisite(Prerequisite::Assistant))?;

    let thread = api
        .create_thread()
        .await
        .map_err(PlanError::remote(Operation::CreateThread))?;
    debug!("Created thread {}", thread.id);

    let outcome = ask_in_thread(api, &thread.id, assistant_id, policy).await;
    let cleanup = api.delete_thread(&thread.id).await;

    match (outcome, cleanup) {
        (Ok(reply), Ok(())) => Ok(reply),
        (Ok(_), Err(e)) => Err(PlanError::remote(Operation::DeleteThread)(e)),
        (Err(err), Err(e)) => {
            warn!("Failed to delete thread {}: {}", thread.id, e);
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
    }
}

/// Ask the assistant for the book's chapters.
pub async fn extract_chapters<A: AssistantApi + ?Sized>(
    api: &A,
    session: &SessionState,
    policy: &PollPolicy,
) -> Result<Vec<Chapter>> {
    let reply = fetch_reply(api, session, policy).await?;
    let chapters = parse_chapters(&reply);
    info!("Extracted {} chapter(s)", chapters.len());
    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::providers::MockAssistantApi;
    use tokio::time::Instant;

    fn session() -> SessionState {
        let mut session = SessionState::with_api_key("sk-test");
        session.assistant_id = Some("asst_1".to_string());
        session
    }

    #[test]
    fn test_run_phases() {
        assert_eq!(RunPhase::from(RunStatus::Queued), RunPhase::Queued);
        assert_eq!(RunPhase::from(RunStatus::InProgress), RunPhase::Running);
        assert_eq!(RunPhase::from(RunStatus::Cancelling), RunPhase::Cancelling);
        assert!(RunPhase::from(RunStatus::Completed).is_terminal());
        assert!(RunPhase::from(RunStatus::Failed).is_terminal());
        assert!(RunPhase::from(RunStatus::RequiresAction).is_terminal());
        assert!(!RunPhase::from(RunStatus::Cancelling).is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_sleeps_before_reading_reply() {
        let api = MockAssistantApi::new()
            .with_run_statuses(vec![
                RunStatus::Queued,
                RunStatus::InProgress,
                RunStatus::Completed,
            ])
            .with_reply("Sure!\n1. Foo\n2. Bar");

        let start = Instant::now();
        let chapters = extract_chapters(&api, &session(), &PollPolicy::default())
            .await
            .unwrap();

        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
        assert_eq!(api.call_count("retrieve_run"), 2);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].name, "1. Foo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_still_reads_message() {
        let api = MockAssistantApi::new()
            .with_run_statuses(vec![RunStatus::InProgress, RunStatus::Failed])
            .with_reply("1. Stale");

        let chapters = extract_chapters(&api, &session(), &PollPolicy::default())
            .await
            .unwrap();

        assert_eq!(api.call_count("list_messages"), 1);
        assert_eq!(chapters, vec![Chapter::new(1, "1. Stale")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_message_is_no_data() {
        let api = MockAssistantApi::new().with_run_statuses(vec![RunStatus::Completed]);

        let err = fetch_reply(&api, &session(), &PollPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PlanError::NoDataReturned));
        assert_eq!(api.call_count("delete_thread"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_and_instructions_sent() {
        let api = MockAssistantApi::new()
            .with_run_statuses(vec![RunStatus::Completed])
            .with_reply("1. Only");

        fetch_reply(&api, &session(), &PollPolicy::default())
            .await
            .unwrap();

        let messages = api.posted_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, CHAPTERS_PROMPT);

        let runs = api.started_runs();
        assert_eq!(runs[0].assistant_id, "asst_1");
        assert_eq!(runs[0].instructions, RUN_INSTRUCTIONS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_stops_waiting() {
        let api = MockAssistantApi::new().with_run_statuses(vec![RunStatus::InProgress]);
        let policy = PollPolicy::default().with_max_attempts(3);

        let start = Instant::now();
        let err = fetch_reply(&api, &session(), &policy).await.unwrap_err();

        assert!(matches!(err, PlanError::PollTimeout { attempts: 3 }));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));
        assert_eq!(api.call_count("list_messages"), 0);
        assert_eq!(api.call_count("delete_thread"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_attempts_keeps_polling() {
        let config: crate::Config = toml::from_str("[poll]\nmax_attempts = 0\n").unwrap();
        let api = MockAssistantApi::new()
            .with_run_statuses(vec![RunStatus::Queued, RunStatus::Completed])
            .with_reply("1. Only");

        let chapters = extract_chapters(&api, &session(), &config.poll.policy())
            .await
            .unwrap();
        assert_eq!(chapters, vec![Chapter::new(1, "1. Only")]);
        assert_eq!(api.call_count("retrieve_run"), 1);

        let api = MockAssistantApi::new()
            .with_run_statuses(vec![RunStatus::InProgress, RunStatus::Completed])
            .with_reply("1. Only");
        let policy = PollPolicy::default().with_max_attempts(0);
        fetch_reply(&api, &session(), &policy).await.unwrap();
        assert_eq!(api.call_count("retrieve_run"), 1);
    }

    #[tokio::test]
    async fn test_missing_assistant_makes_no_calls() {
        let api = MockAssistantApi::new();
        let err = fetch_reply(&api, &SessionState::new(), &PollPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlanError::MissingPrerequisite(Prerequisite::Assistant)
        ));
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_thread_deleted_when_run_fails_to_start() {
        let api = MockAssistantApi::new().fail_on(
            "create_run",
            ApiError::Status {
                status_code: 400,
                message: "no such assistant".to_string(),
            },
        );

        let err = fetch_reply(&api, &session(), &PollPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlanError::RemoteOperationFailed {
                operation: Operation::CreateRun,
                ..
            }
        ));
        assert_eq!(api.deleted_ids("delete_thread"), vec!["thread_1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_failure_after_success_is_reported() {
        let api = MockAssistantApi::new()
            .with_run_statuses(vec![RunStatus::Completed])
            .with_reply("1. Only")
            .fail_on("delete_thread", ApiError::Transport("reset".to_string()));

        let err = fetch_reply(&api, &session(), &PollPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlanError::RemoteOperationFailed {
                operation: Operation::DeleteThread,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_error_wins_over_cleanup_failure() {
        let api = MockAssistantApi::new()
            .fail_on("create_run", ApiError::Transport("refused".to_string()))
            .fail_on("delete_thread", ApiError::Transport("reset".to_string()));

        let err = fetch_reply(&api, &session(), &PollPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlanError::RemoteOperationFailed {
                operation: Operation::CreateRun,
                ..
            }
        ));
        assert_eq!(api.deleted_ids("delete_thread"), vec!["thread_1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_thread_id_untouched() {
        let api = MockAssistantApi::new()
            .with_run_statuses(vec![RunStatus::Completed])
            .with_reply("1. Only");
        let mut session = session();
        session.thread_id = Some("thread_stale".to_string());

        fetch_reply(&api, &session, &PollPolicy::default())
            .await
            .unwrap();

        assert_eq!(api.deleted_ids("delete_thread"), vec!["thread_1".to_string()]);
        assert_eq!(session.thread_id.as_deref(), Some("thread_stale"));
    }
}
