//! Output formatting for forumctl
//!
//! Every command prints pretty JSON on stdout; logs go to stderr.

use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", render_json(value)?);
    Ok(())
}
