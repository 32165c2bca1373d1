//! CLI command implementations.

mod auth;
mod fetch;

pub use auth::{login, logout, signup, status, SignupArgs};
pub use fetch::fetch;

use anyhow::Result;
use std::io::{self, Write};

/// Read one trimmed line from stdin after printing `label`.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
