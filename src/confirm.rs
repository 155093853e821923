//! Overwrite confirmation providers.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Mutex;

/// Decides whether an existing output file may be replaced.
pub trait OverwritePolicy: Send + Sync {
    fn confirm_overwrite(&self, path: &Path) -> bool;
}

/// Only an answer of exactly `y` or `Y` counts as consent.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim_end_matches(['\r', '\n']), "y" | "Y")
}

/// Asks on stdout and reads the answer from stdin.
#[derive(Debug, Default)]
pub struct PromptOnStdin {
    lock: Mutex<()>,
}

impl PromptOnStdin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverwritePolicy for PromptOnStdin {
    fn confirm_overwrite(&self, path: &Path) -> bool {
        // One question on the terminal at a time
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        print!("Output file {} exists. Overwrite? (y/N): ", path.display());
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(_) => false,
        }
    }
}

/// Answers every question the same way without asking.
#[derive(Debug, Clone, Copy)]
pub struct AutoAnswer(pub bool);

impl OverwritePolicy for AutoAnswer {
    fn confirm_overwrite(&self, _path: &Path) -> bool {
        self.0
    }
}
