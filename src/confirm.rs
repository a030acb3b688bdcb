// ✋ Operator confirmation - the one blocking point of a reconciliation run
//
// The coordinator never talks to a terminal directly; it asks a `Confirm`.

use std::io::{self, BufRead, Write};
use tracing::{info, warn};

pub trait Confirm {
    /// Ask the operator; anything but an explicit yes is a no
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<C: Confirm + ?Sized> Confirm for &mut C {
    fn confirm(&mut self, prompt: &str) -> bool {
        (**self).confirm(prompt)
    }
}

/// Interactive prompt on stdin/stdout
pub struct ConsoleConfirm<R = io::StdinLock<'static>, W = io::Stdout> {
    input: R,
    output: W,
}

impl ConsoleConfirm {
    pub fn new() -> Self {
        ConsoleConfirm {
            input: io::stdin().lock(),
            output: io::stdout(),
        }
    }
}

impl Default for ConsoleConfirm {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> ConsoleConfirm<R, W> {
    pub fn from_io(input: R, output: W) -> Self {
        ConsoleConfirm { input, output }
    }

    fn show_prompt(&mut self, prompt: &str) -> io::Result<()> {
        write!(self.output, "{} [y/N]: ", prompt)?;
        self.output.flush()
    }
}

impl<R: BufRead, W: Write> Confirm for ConsoleConfirm<R, W> {
    fn confirm(&mut self, prompt: &str) -> bool {
        // The answer still decides; a prompt that did not render is only logged
        if let Err(e) = self.show_prompt(prompt) {
            warn!(error = %e, prompt, "failed to write confirmation prompt");
        }

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) => {
                warn!("no answer on stdin, treating as refusal");
                false
            }
            Ok(_) => is_yes(&answer),
            Err(e) => {
                warn!(error = %e, "failed to read confirmation, treating as refusal");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Unattended policy from configuration: always the same answer
#[derive(Debug, Clone, Copy)]
pub struct AutoApprove(pub bool);

impl Confirm for AutoApprove {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.0 {
            info!(prompt, "auto-approved");
        } else {
            warn!(prompt, "auto-approve disabled, refusing");
        }
        self.0
    }
}
