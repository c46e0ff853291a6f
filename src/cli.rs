//! CLI utilities for talking to the Entry Point.
//!
//! The utilities present in this module can be used to build an interactive front end:
//! [`prompt`] reads one [`Command`], [`render`] formats a reply for the terminal.
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::{
    command::{Command, CommandError},
    protocol::{Message, fault},
};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("prompt IO error: {0}")]
    Io(#[from] io::Error),
}

/// Prompt user for a valid command.
///
/// End of input is read as [`Command::Exit`].
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, PromptError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }
    Ok(Command::try_from(s.as_str())?)
}

/// Formats a decoded reply: a status line followed by the body.
pub fn render(message: &Message<'_>) -> String {
    let header = &message.header;
    let mut out = match header.resp_code {
        fault::OK => format!("{} ok", message.msg_type()),
        code => format!(
            "{} failed: {code} ({})",
            message.msg_type(),
            fault::describe(code)
        ),
    };
    if header.more {
        out.push_str(" [more]");
    }
    out.push('\n');
    out.push_str(&message.body.to_string());
    out
}
