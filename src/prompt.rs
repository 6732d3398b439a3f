//! Interactive conflict prompt

use dialoguer::Input;
use std::io;
use std::path::Path;
use tracing::debug;

use crate::planner::{ConflictDecision, DecisionProvider};

const CHOICES: &str = "[S]kip, [o]verwrite, or [r]ename";

/// Asks on the terminal what to do with an existing destination.
///
/// Prints `<dest> already exists.` and then the choices. The question is
/// repeated until the answer is `s`, `o` or `r` or the full word (any case).
/// An empty answer means skip, and so does a failed read, which is what
/// happens when stdin is not a terminal.
pub struct InteractivePrompt<F = fn() -> io::Result<String>> {
    read_answer: F,
}

impl InteractivePrompt {
    pub fn new() -> Self {
        Self {
            read_answer: read_terminal,
        }
    }
}

impl Default for InteractivePrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FnMut() -> io::Result<String>> InteractivePrompt<F> {
    /// Prompt with answers taken from `read_answer` instead of the terminal
    pub fn with_reader(read_answer: F) -> Self {
        Self { read_answer }
    }

    fn ask(&mut self) -> ConflictDecision {
        loop {
            match (self.read_answer)() {
                Ok(answer) if answer.trim().is_empty() => return ConflictDecision::Skip,
                Ok(answer) => {
                    if let Some(decision) = ConflictDecision::parse_choice(&answer) {
                        return decision;
                    }
                },
                Err(e) => {
                    debug!(error = %e, "prompt read failed, skipping");
                    return ConflictDecision::Skip;
                },
            }
        }
    }
}

impl<F: FnMut() -> io::Result<String>> DecisionProvider for InteractivePrompt<F> {
    fn decide(&mut self, dest: &Path) -> ConflictDecision {
        println!("{} already exists.", dest.display());
        self.ask()
    }
}

fn read_terminal() -> io::Result<String> {
    Input::<String>::new()
        .with_prompt(CHOICES)
        .allow_empty(true)
        .interact_text()
        .map_err(io::Error::other)
}
