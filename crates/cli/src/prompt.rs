//! Interactive answers for installer prompts.

use std::io::{BufRead, Write};

use {
    skillsync_install::{DecisionProvider, Prompt},
    tokio::runtime::RuntimeFlavor,
    tracing::warn,
};

/// Asks on stderr and reads the answer from stdin, so stdout carries only
/// reports. Empty input means yes; end of input or a read error means no.
pub struct TerminalPrompter;

impl DecisionProvider for TerminalPrompter {
    fn confirm(&self, prompt: &Prompt) -> bool {
        blocking(|| {
            let stdin = std::io::stdin();
            ask(&mut stdin.lock(), &mut std::io::stderr(), prompt)
        })
    }
}

/// Run a blocking terminal read without stalling other tasks on a
/// multi-threaded runtime.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        },
        _ => f(),
    }
}

fn ask(reader: &mut impl BufRead, writer: &mut impl Write, prompt: &Prompt) -> bool {
    if write!(writer, "{prompt} [Y/n]: ").and_then(|()| writer.flush()).is_err() {
        return false;
    }
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => false,
        Ok(_) => parse_answer(&line),
        Err(e) => {
            warn!(error = %e, "failed to read answer, treating as no");
            false
        },
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "" | "y" | "yes")
}
