//! Error taxonomy for a single invocation.
//!
//! A failing shell command is not represented here: it is data carried by
//! [`crate::executor::ExecutionResult`] and fed back to the model. Every
//! variant below ends the invocation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HowError>;

#[derive(Debug, Error)]
pub enum HowError {
    /// Bad or missing command-line input. No loop is entered.
    #[error("{0}")]
    Usage(String),

    /// The model service was unreachable, refused the credential, or rate-limited us.
    #[error("Model service error: {0}")]
    Transport(String),

    /// The model answered, but not with the agreed JSON shape.
    #[error("Model returned a malformed proposal: {0}")]
    MalformedResponse(String),

    /// The shell itself could not be started.
    #[error("Could not run the shell: {0}")]
    ExecutorFault(String),

    /// The command kept failing until the attempt limit was reached.
    #[error("Giving up after {0} failed attempts")]
    AttemptsExhausted(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HowError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            HowError::Usage(_) => 2,
            _ => 1,
        }
    }
}

impl From<toml::de::Error> for HowError {
    fn from(err: toml::de::Error) -> Self {
        HowError::Config(format!("TOML deserialization error: {}", err))
    }
}

impl From<toml::ser::Error> for HowError {
    fn from(err: toml::ser::Error) -> Self {
        HowError::Config(format!("TOML serialization error: {}", err))
    }
}
