//! Command handlers

use std::io::{self, IsTerminal, Write};

use anyhow::Result;

pub mod config;
pub mod data;
pub mod note;
pub mod status;

/// Ask a yes/no question on the terminal
///
/// Returns false without asking when stdin is not a TTY.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
