pub mod cli;
pub mod command;
pub mod protocol;

pub use cli::{prompt, render};
pub use command::{Command, CommandError, Request};
pub use protocol::{Client, ConnectionConfig, FrontApiError, Message};
