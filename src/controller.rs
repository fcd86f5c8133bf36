//! The refine-execute loop.
//!
//! One [`Controller::run`] call handles one query:
//!
//! ```text
//! Proposing -> AwaitingConfirmation -> Executing -> Succeeded
//!     ^                 |                  |
//!     |                 v                  v
//!     |             Declined        RetryingWithError --+
//!     +-------------------------------------------------+
//! ```
//!
//! Any transport, parse, prompt or executor fault moves to `Aborted`. So does
//! running out of attempts. The conversation only ever grows: each retry
//! appends the failed proposal and the error it produced.

use crate::confirmation::{Choice, Confirmation};
use crate::conversation::{Conversation, ConversationMessage, ShellTarget};
use crate::error::HowError;
use crate::executor::ShellExecutor;
use crate::proposal::{ProposalClient, ProposalOutput};
use crate::providers::StatusIndicator;
use std::io::{self, Write};
use tracing::{error, info, warn};

const PROPOSING_MESSAGE: &str = "Executing Magic ✨";
const FIXING_MESSAGE: &str = "Fixing Errors ✨";

/// Loop state. Non-terminal states carry what the next step needs.
#[derive(Debug)]
enum LoopState {
    Proposing,
    AwaitingConfirmation(ProposalOutput),
    Executing(ProposalOutput),
    RetryingWithError(Vec<String>),
    Succeeded,
    Declined,
    Aborted(HowError),
}

impl LoopState {
    fn phase(&self) -> Phase {
        match self {
            LoopState::Proposing => Phase::Proposing,
            LoopState::AwaitingConfirmation(_) => Phase::AwaitingConfirmation,
            LoopState::Executing(_) => Phase::Executing,
            LoopState::RetryingWithError(_) => Phase::RetryingWithError,
            LoopState::Succeeded => Phase::Succeeded,
            LoopState::Declined => Phase::Declined,
            LoopState::Aborted(_) => Phase::Aborted,
        }
    }
}

/// Name of a loop state, as recorded in [`RunReport::phases`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Proposing,
    AwaitingConfirmation,
    Executing,
    RetryingWithError,
    Succeeded,
    Declined,
    Aborted,
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    Succeeded,
    Declined,
    Aborted(HowError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

/// Everything observable about a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: Outcome,
    /// Every state entered, in order, ending with the terminal one.
    pub phases: Vec<Phase>,
    /// Proposals received from the model.
    pub proposals: u32,
    /// Commands handed to the executor.
    pub executions: u32,
    /// Conversation length on each entry to `Proposing`.
    pub conversation_lengths: Vec<usize>,
    /// The final conversation.
    pub conversation: Conversation,
}

/// Drives one query through propose, confirm, execute and retry.
///
/// # Example
///
/// ```ignore
/// let mut controller = Controller::new(
///     Box::new(client),
///     Box::new(SystemShellExecutor::from_env(true)),
///     Box::new(TerminalConfirmation::new()),
///     Box::new(SpinnerStatus::new()),
///     settings.max_attempts,
/// );
/// let report = controller.run("list files in current directory", &target).await;
/// ```
pub struct Controller {
    client: Box<dyn ProposalClient>,
    executor: Box<dyn ShellExecutor>,
    confirmation: Box<dyn Confirmation>,
    status: Box<dyn StatusIndicator>,
    max_attempts: u32,
}

impl Controller {
    /// `max_attempts` bounds how many failed executions are fed back before
    /// giving up. Values below 1 are treated as 1.
    pub fn new(
        client: Box<dyn ProposalClient>,
        executor: Box<dyn ShellExecutor>,
        confirmation: Box<dyn Confirmation>,
        status: Box<dyn StatusIndicator>,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            executor,
            confirmation,
            status,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Runs the loop, writing notices to stdout.
    pub async fn run(&mut self, query: &str, target: &ShellTarget) -> RunReport {
        let mut stdout = io::stdout();
        self.run_with_io(query, target, &mut stdout).await
    }

    /// Runs the loop, writing notices (such as a model substitution) to `output`.
    pub async fn run_with_io<W: Write>(
        &mut self,
        query: &str,
        target: &ShellTarget,
        output: &mut W,
    ) -> RunReport {
        let mut conversation = Conversation::seed(query, target);
        let mut phases = Vec::new();
        let mut conversation_lengths = Vec::new();
        let mut proposals = 0u32;
        let mut executions = 0u32;
        let mut failures = 0u32;

        info!("Starting refine-execute loop for: {}", query);

        let mut state = match self.client.select_model().await {
            Ok(selection) => {
                if let Some(notice) = selection.notice() {
                    if let Err(e) = writeln!(output, "{}", notice) {
                        warn!("Could not print model notice: {}", e);
                    }
                }
                LoopState::Proposing
            }
            Err(e) => LoopState::Aborted(e),
        };

        let outcome = loop {
            phases.push(state.phase());

            state = match state {
                LoopState::Proposing => {
                    conversation_lengths.push(conversation.len());
                    let message = if failures == 0 { PROPOSING_MESSAGE } else { FIXING_MESSAGE };

                    self.status.start(message);
                    let result = self.client.propose(conversation.messages()).await;
                    self.status.stop();

                    match result {
                        Ok(proposal) => {
                            proposals += 1;
                            info!("Proposal {}: {}", proposals, proposal.output.command);
                            conversation.push(ConversationMessage::assistant(proposal.raw));
                            LoopState::AwaitingConfirmation(proposal.output)
                        }
                        Err(e) => LoopState::Aborted(e),
                    }
                }

                LoopState::AwaitingConfirmation(proposal) => match self.confirmation.confirm(&proposal) {
                    Ok(Choice::Yes) => LoopState::Executing(proposal),
                    Ok(Choice::No) => LoopState::Declined,
                    Err(e) => LoopState::Aborted(e),
                },

                LoopState::Executing(proposal) => {
                    executions += 1;
                    match self.executor.execute(&proposal.command).await {
                        Ok(result) if result.succeeded => LoopState::Succeeded,
                        Ok(result) => {
                            failures += 1;
                            let mut errors = result.errors();
                            if errors.is_empty() {
                                errors.push(format!("`{}` failed", proposal.command));
                            }
                            warn!("Attempt {} failed: {}", failures, errors.join(" | "));

                            if failures >= self.max_attempts {
                                LoopState::Aborted(HowError::AttemptsExhausted(failures))
                            } else {
                                LoopState::RetryingWithError(errors)
                            }
                        }
                        Err(e) => LoopState::Aborted(e),
                    }
                }

                LoopState::RetryingWithError(errors) => {
                    conversation.push_error_feedback(&errors);
                    LoopState::Proposing
                }

                LoopState::Succeeded => {
                    info!("Command succeeded after {} proposal(s)", proposals);
                    break Outcome::Succeeded;
                }
                LoopState::Declined => {
                    info!("User declined the proposal");
                    break Outcome::Declined;
                }
                LoopState::Aborted(e) => {
                    error!("Aborting: {}", e);
                    break Outcome::Aborted(e);
                }
            };
        };

        RunReport {
            outcome,
            phases,
            proposals,
            executions,
            conversation_lengths,
            conversation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::error::Result;
    use crate::executor::ExecutionResult;
    use crate::proposal::{ModelSelection, Proposal, parse_proposal};
    use crate::providers::SilentStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    // =========================================================================
    // Scripted collaborators
    // =========================================================================

    #[derive(Clone, Default)]
    struct Log {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Log {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.events().iter().filter(|e| e.starts_with(prefix)).count()
        }
    }

    /// Replays raw assistant contents; `Err` entries become transport errors.
    struct ScriptedClient {
        replies: Mutex<VecDeque<std::result::Result<String, String>>>,
        selection: ModelSelection,
        selection_error: Option<String>,
        seen: Arc<Mutex<Vec<Vec<ConversationMessage>>>>,
        log: Log,
    }

    impl ScriptedClient {
        fn new(replies: Vec<std::result::Result<&str, &str>>, log: &Log) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                selection: ModelSelection::Configured("gpt-4o".to_string()),
                selection_error: None,
                seen: Arc::new(Mutex::new(Vec::new())),
                log: log.clone(),
            }
        }
    }

    #[async_trait]
    impl ProposalClient for ScriptedClient {
        async fn select_model(&mut self) -> Result<ModelSelection> {
            self.log.push("select_model".to_string());
            match &self.selection_error {
                Some(message) => Err(HowError::Transport(message.clone())),
                None => Ok(self.selection.clone()),
            }
        }

        async fn propose(&self, messages: &[ConversationMessage]) -> Result<Proposal> {
            self.log.push("propose".to_string());
            self.seen.lock().unwrap().push(messages.to_vec());
            let reply = self.replies.lock().unwrap().pop_front().expect("no scripted reply");
            match reply {
                Ok(raw) => Ok(Proposal {
                    output: parse_proposal(&raw)?,
                    raw,
                }),
                Err(message) => Err(HowError::Transport(message)),
            }
        }
    }

    struct ScriptedExecutor {
        results: Mutex<VecDeque<Result<ExecutionResult>>>,
        log: Log,
    }

    impl ScriptedExecutor {
        fn new(results: Vec<Result<ExecutionResult>>, log: &Log) -> Self {
            Self {
                results: Mutex::new(results.into_iter().collect()),
                log: log.clone(),
            }
        }
    }

    #[async_trait]
    impl ShellExecutor for ScriptedExecutor {
        async fn execute(&self, command: &str) -> Result<ExecutionResult> {
            self.log.push(format!("execute {}", command));
            self.results.lock().unwrap().pop_front().expect("no scripted execution")
        }
    }

    struct ScriptedConfirmation {
        answers: VecDeque<Choice>,
        log: Log,
    }

    impl ScriptedConfirmation {
        fn new(answers: Vec<Choice>, log: &Log) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                log: log.clone(),
            }
        }
    }

    impl Confirmation for ScriptedConfirmation {
        fn confirm(&mut self, proposal: &ProposalOutput) -> Result<Choice> {
            let answer = self.answers.pop_front().expect("no scripted answer");
            self.log.push(format!("confirm {} -> {:?}", proposal.command, answer));
            Ok(answer)
        }
    }

    struct RecordingStatus {
        log: Log,
    }

    impl StatusIndicator for RecordingStatus {
        fn start(&mut self, message: &str) {
            self.log.push(format!("status {}", message));
        }
        fn stop(&mut self) {}
    }

    fn controller(
        client: ScriptedClient,
        executor: ScriptedExecutor,
        confirmation: ScriptedConfirmation,
        max_attempts: u32,
    ) -> Controller {
        Controller::new(
            Box::new(client),
            Box::new(executor),
            Box::new(confirmation),
            Box::new(SilentStatus),
            max_attempts,
        )
    }

    fn target() -> ShellTarget {
        ShellTarget::new("zsh", "macos")
    }

    const LS: &str = r#"{"command":"ls","explanation":"Lists files","warning":null}"#;
    const LSS: &str = r#"{"command":"lss","explanation":"Lists files"}"#;

    async fn run(controller: &mut Controller, query: &str) -> (RunReport, String) {
        let mut output = Vec::new();
        let report = controller.run_with_io(query, &target(), &mut output).await;
        (report, String::from_utf8(output).unwrap())
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    #[tokio::test]
    async fn test_confirmed_command_succeeds_first_time() {
        let log = Log::default();
        let mut controller = controller(
            ScriptedClient::new(vec![Ok(LS)], &log),
            ScriptedExecutor::new(vec![Ok(ExecutionResult::success(vec!["a\n".to_string()]))], &log),
            ScriptedConfirmation::new(vec![Choice::Yes], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files in current directory").await;

        assert!(report.outcome.is_success());
        assert_eq!(report.proposals, 1);
        assert_eq!(report.executions, 1);
        assert_eq!(report.conversation.assistant_turns(), 1);
        assert_eq!(
            report.phases,
            vec![Phase::Proposing, Phase::AwaitingConfirmation, Phase::Executing, Phase::Succeeded]
        );
        assert_eq!(log.count("execute ls"), 1);
    }

    #[tokio::test]
    async fn test_failed_command_is_fed_back_and_corrected() {
        let log = Log::default();
        let client = ScriptedClient::new(vec![Ok(LSS), Ok(LS)], &log);
        let seen = client.seen.clone();
        let mut controller = controller(
            client,
            ScriptedExecutor::new(
                vec![
                    Ok(ExecutionResult::failure(vec!["command not found: lss\n".to_string()])),
                    Ok(ExecutionResult::success(vec![])),
                ],
                &log,
            ),
            ScriptedConfirmation::new(vec![Choice::Yes, Choice::Yes], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files in current directory").await;

        assert!(report.outcome.is_success());
        assert_eq!(report.proposals, 2);
        assert_eq!(report.executions, 2);
        assert_eq!(report.conversation.assistant_turns(), 2);
        assert_eq!(log.events(), vec![
            "select_model",
            "propose",
            "confirm lss -> Yes",
            "execute lss",
            "propose",
            "confirm ls -> Yes",
            "execute ls",
        ]);

        // The second request carries the first proposal and its error.
        let requests = seen.lock().unwrap().clone();
        let second = &requests[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[2].role, Role::Assistant);
        assert_eq!(second[2].content, LSS);
        assert_eq!(second[3].role, Role::User);
        assert!(second[3].content.contains("command not found: lss"));
        assert!(second[3].content.contains("previously specified format"));
    }

    #[tokio::test]
    async fn test_declined_proposal_never_executes() {
        let log = Log::default();
        let mut controller = controller(
            ScriptedClient::new(vec![Ok(LS)], &log),
            ScriptedExecutor::new(vec![], &log),
            ScriptedConfirmation::new(vec![Choice::No], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;

        assert!(matches!(report.outcome, Outcome::Declined));
        assert_eq!(report.executions, 0);
        assert_eq!(log.count("execute"), 0);
        assert_eq!(report.phases.last(), Some(&Phase::Declined));
    }

    #[tokio::test]
    async fn test_unparsable_proposal_aborts_without_executing() {
        let log = Log::default();
        let mut controller = controller(
            ScriptedClient::new(vec![Ok("Sure, just run ls")], &log),
            ScriptedExecutor::new(vec![], &log),
            ScriptedConfirmation::new(vec![], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;

        assert!(matches!(report.outcome, Outcome::Aborted(HowError::MalformedResponse(_))));
        assert_eq!(report.executions, 0);
        assert_eq!(report.conversation.assistant_turns(), 0);
        assert_eq!(report.phases, vec![Phase::Proposing, Phase::Aborted]);
    }

    #[tokio::test]
    async fn test_missing_field_aborts() {
        let log = Log::default();
        let mut controller = controller(
            ScriptedClient::new(vec![Ok(r#"{"command":"ls"}"#)], &log),
            ScriptedExecutor::new(vec![], &log),
            ScriptedConfirmation::new(vec![], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;
        assert!(matches!(report.outcome, Outcome::Aborted(HowError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_fallback_model_notice_printed_once_before_first_proposal() {
        let log = Log::default();
        let mut client = ScriptedClient::new(vec![Ok(LSS), Ok(LS)], &log);
        client.selection = ModelSelection::Fallback {
            requested: "gpt-5".to_string(),
            fallback: "gpt-3.5-turbo".to_string(),
        };
        let mut controller = controller(
            client,
            ScriptedExecutor::new(
                vec![
                    Ok(ExecutionResult::failure(vec!["oops".to_string()])),
                    Ok(ExecutionResult::success(vec![])),
                ],
                &log,
            ),
            ScriptedConfirmation::new(vec![Choice::Yes, Choice::Yes], &log),
            5,
        );

        let (report, output) = run(&mut controller, "list files").await;

        assert!(report.outcome.is_success());
        assert_eq!(output.matches("Downgrading to gpt-3.5-turbo").count(), 1);
        assert_eq!(log.count("select_model"), 1);
        assert_eq!(log.events()[0], "select_model");
    }

    // =========================================================================
    // Failure handling
    // =========================================================================

    #[tokio::test]
    async fn test_transport_error_aborts() {
        let log = Log::default();
        let mut controller = controller(
            ScriptedClient::new(vec![Err("HTTP 401: Invalid key")], &log),
            ScriptedExecutor::new(vec![], &log),
            ScriptedConfirmation::new(vec![], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;

        assert!(matches!(report.outcome, Outcome::Aborted(HowError::Transport(_))));
        assert_eq!(report.executions, 0);
    }

    #[tokio::test]
    async fn test_model_listing_failure_aborts_before_proposing() {
        let log = Log::default();
        let mut client = ScriptedClient::new(vec![], &log);
        client.selection_error = Some("HTTP 401: Incorrect API key provided".to_string());
        let mut controller = controller(
            client,
            ScriptedExecutor::new(vec![], &log),
            ScriptedConfirmation::new(vec![], &log),
            5,
        );

        let (report, output) = run(&mut controller, "list files").await;

        assert!(matches!(report.outcome, Outcome::Aborted(HowError::Transport(_))));
        assert_eq!(report.phases, vec![Phase::Aborted]);
        assert_eq!(report.proposals, 0);
        assert_eq!(report.executions, 0);
        assert_eq!(log.events(), vec!["select_model"]);
        assert!(output.is_empty());
    }

    /// Writer whose every write fails.
    struct ClosedOutput;

    impl Write for ClosedOutput {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unwritable_notice_does_not_stop_the_run() {
        let log = Log::default();
        let mut client = ScriptedClient::new(vec![Ok(LS)], &log);
        client.selection = ModelSelection::Fallback {
            requested: "gpt-5".to_string(),
            fallback: "gpt-3.5-turbo".to_string(),
        };
        let mut controller = controller(
            client,
            ScriptedExecutor::new(vec![Ok(ExecutionResult::success(vec![]))], &log),
            ScriptedConfirmation::new(vec![Choice::Yes], &log),
            5,
        );

        let report = controller
            .run_with_io("list files", &target(), &mut ClosedOutput)
            .await;

        assert!(report.outcome.is_success());
        assert_eq!(report.executions, 1);
    }

    #[tokio::test]
    async fn test_transport_error_on_retry_aborts() {
        let log = Log::default();
        let mut controller = controller(
            ScriptedClient::new(vec![Ok(LSS), Err("HTTP 429: Rate limit")], &log),
            ScriptedExecutor::new(vec![Ok(ExecutionResult::failure(vec!["nope".to_string()]))], &log),
            ScriptedConfirmation::new(vec![Choice::Yes], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;

        assert!(matches!(report.outcome, Outcome::Aborted(HowError::Transport(_))));
        assert_eq!(report.executions, 1);
    }

    #[tokio::test]
    async fn test_executor_fault_aborts() {
        let log = Log::default();
        let mut controller = controller(
            ScriptedClient::new(vec![Ok(LS)], &log),
            ScriptedExecutor::new(vec![Err(HowError::ExecutorFault("no shell".to_string()))], &log),
            ScriptedConfirmation::new(vec![Choice::Yes], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;

        assert!(matches!(report.outcome, Outcome::Aborted(HowError::ExecutorFault(_))));
        assert_eq!(log.count("propose"), 1);
    }

    #[tokio::test]
    async fn test_attempt_limit_stops_the_loop() {
        let log = Log::default();
        let failure = || Ok(ExecutionResult::failure(vec!["still broken".to_string()]));
        let mut controller = controller(
            ScriptedClient::new(vec![Ok(LSS), Ok(LSS), Ok(LSS)], &log),
            ScriptedExecutor::new(vec![failure(), failure(), failure()], &log),
            ScriptedConfirmation::new(vec![Choice::Yes, Choice::Yes, Choice::Yes], &log),
            3,
        );

        let (report, _) = run(&mut controller, "list files").await;

        assert!(matches!(report.outcome, Outcome::Aborted(HowError::AttemptsExhausted(3))));
        assert_eq!(report.executions, 3);
        assert_eq!(report.proposals, 3);
    }

    #[tokio::test]
    async fn test_failure_without_error_text_still_gives_feedback() {
        let log = Log::default();
        let client = ScriptedClient::new(vec![Ok(LSS), Ok(LS)], &log);
        let seen = client.seen.clone();
        let mut controller = controller(
            client,
            ScriptedExecutor::new(
                vec![Ok(ExecutionResult::failure(vec![])), Ok(ExecutionResult::success(vec![]))],
                &log,
            ),
            ScriptedConfirmation::new(vec![Choice::Yes, Choice::Yes], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;

        assert!(report.outcome.is_success());
        let requests = seen.lock().unwrap().clone();
        assert!(requests[1][3].content.contains("`lss` failed"));
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    #[tokio::test]
    async fn test_execution_only_follows_yes() {
        let log = Log::default();
        let mut controller = controller(
            ScriptedClient::new(vec![Ok(LSS), Ok(LS)], &log),
            ScriptedExecutor::new(vec![Ok(ExecutionResult::failure(vec!["x".to_string()]))], &log),
            ScriptedConfirmation::new(vec![Choice::Yes, Choice::No], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;
        assert!(matches!(report.outcome, Outcome::Declined));

        let events = log.events();
        for (i, event) in events.iter().enumerate() {
            if event.starts_with("execute") {
                assert!(events[i - 1].ends_with("-> Yes"), "execution not preceded by Yes: {:?}", events);
            }
        }
        assert_eq!(log.count("execute"), 1);
    }

    #[tokio::test]
    async fn test_conversation_grows_on_every_retry() {
        let log = Log::default();
        let failure = || Ok(ExecutionResult::failure(vec!["err".to_string()]));
        let mut controller = controller(
            ScriptedClient::new(vec![Ok(LSS), Ok(LSS), Ok(LSS), Ok(LS)], &log),
            ScriptedExecutor::new(
                vec![failure(), failure(), failure(), Ok(ExecutionResult::success(vec![]))],
                &log,
            ),
            ScriptedConfirmation::new(vec![Choice::Yes; 4], &log),
            5,
        );

        let (report, _) = run(&mut controller, "list files").await;

        assert!(report.outcome.is_success());
        assert_eq!(report.conversation_lengths, vec![2, 4, 6, 8]);
        assert!(report.conversation_lengths.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(report.conversation.len(), 9);
    }

    #[tokio::test]
    async fn test_status_messages_switch_on_retry() {
        let log = Log::default();
        let mut controller = Controller::new(
            Box::new(ScriptedClient::new(vec![Ok(LSS), Ok(LS)], &log)),
            Box::new(ScriptedExecutor::new(
                vec![
                    Ok(ExecutionResult::failure(vec!["err".to_string()])),
                    Ok(ExecutionResult::success(vec![])),
                ],
                &log,
            )),
            Box::new(ScriptedConfirmation::new(vec![Choice::Yes, Choice::Yes], &log)),
            Box::new(RecordingStatus { log: log.clone() }),
            5,
        );

        run(&mut controller, "list files").await;

        let statuses: Vec<String> = log.events().into_iter().filter(|e| e.starts_with("status")).collect();
        assert_eq!(statuses, vec![
            format!("status {}", PROPOSING_MESSAGE),
            format!("status {}", FIXING_MESSAGE),
        ]);
    }

    #[test]
    fn test_zero_max_attempts_is_clamped() {
        let log = Log::default();
        let controller = controller(
            ScriptedClient::new(vec![], &log),
            ScriptedExecutor::new(vec![], &log),
            ScriptedConfirmation::new(vec![], &log),
            0,
        );
        assert_eq!(controller.max_attempts, 1);
    }
}
