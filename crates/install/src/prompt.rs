//! Yes/no decision points, injected so the installer never talks to a
//! terminal directly.

use std::{fmt, path::PathBuf};

/// A question the installer needs answered before acting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Replace an existing file whose content differs from the incoming one.
    Overwrite { path: PathBuf },
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite { path } => write!(f, "Overwrite {}?", path.display()),
        }
    }
}

/// Answers [`Prompt`]s.
pub trait DecisionProvider: Send + Sync {
    fn confirm(&self, prompt: &Prompt) -> bool;
}

/// Always gives the same answer. Backs `--force` / `--yes` and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl DecisionProvider for FixedAnswer {
    fn confirm(&self, _prompt: &Prompt) -> bool {
        self.0
    }
}

impl<F> DecisionProvider for F
where
    F: Fn(&Prompt) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &Prompt) -> bool {
        self(prompt)
    }
}
