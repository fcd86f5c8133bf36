//! Showing a proposal to the user and asking whether to run it.

use crate::error::Result;
use crate::proposal::ProposalOutput;
use std::io::{self, BufRead, Write};
use tracing::info;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// The user's answer to "run this command?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Yes,
    No,
}

/// Presents a proposal and collects a yes/no decision.
pub trait Confirmation: Send {
    fn confirm(&mut self, proposal: &ProposalOutput) -> Result<Choice>;
}

/// Writes the command, explanation and (if any) warning to `output`.
pub fn display_proposal_with_io<W: Write>(proposal: &ProposalOutput, output: &mut W) -> Result<()> {
    writeln!(output, "By running: \"{}{}{}\"", BOLD, proposal.command, RESET)?;
    writeln!(output, "{}Explanation:{} {}", BOLD, RESET, proposal.explanation)?;
    if let Some(warning) = proposal.warning.as_deref() {
        writeln!(output, "{}Warning:{} {}", BOLD, RESET, warning)?;
    }
    Ok(())
}

/// Interactive confirmation on a terminal.
///
/// # Example
///
/// ```no_run
/// use how::confirmation::{Confirmation, TerminalConfirmation};
/// use how::proposal::ProposalOutput;
///
/// let mut ui = TerminalConfirmation::new();
/// let proposal = ProposalOutput {
///     command: "ls".to_string(),
///     explanation: "Lists files".to_string(),
///     warning: None,
/// };
/// let choice = ui.confirm(&proposal)?;
/// # Ok::<(), how::error::HowError>(())
/// ```
#[derive(Debug, Default)]
pub struct TerminalConfirmation;

impl TerminalConfirmation {
    pub fn new() -> Self {
        Self
    }

    /// Shows `proposal` and reads a Yes/No answer from `input`.
    ///
    /// Anything other than y/yes/n/no (any case) re-prompts. End of input is
    /// treated as No.
    pub fn confirm_with_io<R: BufRead, W: Write>(
        &self,
        proposal: &ProposalOutput,
        input: &mut R,
        output: &mut W,
    ) -> Result<Choice> {
        display_proposal_with_io(proposal, output)?;

        loop {
            write!(output, "Do you wanna run this command? [Yes/No] ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                info!("Input closed, treating as 'No' for '{}'", proposal.command);
                return Ok(Choice::No);
            }

            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => {
                    info!("User approved '{}'", proposal.command);
                    return Ok(Choice::Yes);
                }
                "n" | "no" => {
                    info!("User declined '{}'", proposal.command);
                    return Ok(Choice::No);
                }
                _ => {
                    writeln!(output, "Please answer Yes or No.")?;
                }
            }
        }
    }
}

impl Confirmation for TerminalConfirmation {
    fn confirm(&mut self, proposal: &ProposalOutput) -> Result<Choice> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.confirm_with_io(proposal, &mut input, &mut output)
    }
}
