//! The append-only conversation sent to the model on every turn.
//!
//! The first two messages are the seed: a fixed system instruction and the
//! user's literal query. Everything after that is appended. Nothing is ever
//! removed or rewritten, so the model always sees every earlier proposal and
//! the errors it produced.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Shell and operating system the generated commands are meant for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellTarget {
    pub shell: String,
    pub platform: String,
}

impl ShellTarget {
    pub fn new(shell: impl Into<String>, platform: impl Into<String>) -> Self {
        Self { shell: shell.into(), platform: platform.into() }
    }
}

/// Builds the fixed system instruction for `target`.
pub fn system_instruction(target: &ShellTarget) -> String {
    format!(
        "You are an assistant that turns requests into {shell} command line instructions for the OS {platform}. \
Given a user query, respond with the single most relevant command that accomplishes what the user is asking. \
Ignore pleasantries, commentary and questions from the user.\n\
\n\
Respond with EXACTLY one JSON object and nothing else, using this format:\n\
{{\n  \"command\": \"the {shell} command to run\",\n  \"explanation\": \"a short explanation of what the command does\",\n  \"warning\": \"optional caution if the command is destructive or risky, otherwise null\"\n}}\n\
\n\
RULES:\n\
- \"command\" must be a single command line that can be passed to {shell} -c\n\
- \"command\" and \"explanation\" are required strings\n\
- \"warning\" is a string or null; only include one when it matters\n\
- No markdown, no code fences, no other keys",
        shell = target.shell,
        platform = target.platform,
    )
}

/// Text of the user turn that reports a failed command back to the model.
pub fn error_feedback(errors: &[String]) -> String {
    format!(
        "The command returned the following errors: {}. Please fix the errors and return the updated command using the previously specified format.",
        errors.join("\n")
    )
}

/// Ordered, append-only message history for one invocation.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
}

impl Conversation {
    /// Starts a conversation from the seed pair for `query`.
    pub fn seed(query: &str, target: &ShellTarget) -> Self {
        Self {
            messages: vec![
                ConversationMessage::system(system_instruction(target)),
                ConversationMessage::user(query),
            ],
        }
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn push_error_feedback(&mut self, errors: &[String]) {
        self.push(ConversationMessage::user(error_feedback(errors)));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of assistant turns so far.
    pub fn assistant_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::Assistant).count()
    }
}
