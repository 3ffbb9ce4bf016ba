//! Line-oriented prompts on stderr/stdin.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Prints `question` to stderr and returns the next stdin line, trimmed.
pub fn read_line(question: &str) -> Result<String> {
    eprint!("{}", question);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading stdin")?;
    Ok(line.trim().to_string())
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}
