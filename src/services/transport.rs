//! Line-oriented stdio transport: newline-delimited envelopes in, action
//! frames out. Lines starting with `!` are local player commands.

use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tokio_stream::{StreamExt, wrappers::LinesStream};
use tracing::{debug, info, warn};

use crate::{
    dto::action::Action,
    services::runtime::{SyncCommand, SyncHandle},
};

/// One non-blank input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// A server envelope to hand to the synchronizer untouched.
    Frame(String),
    /// A local command such as `!buzz` or `!pick 0 3`.
    Command(SyncCommand),
}

/// Why a `!` command line could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// No command has this name.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    /// A required argument is absent.
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        /// Command name.
        command: &'static str,
        /// What was expected.
        argument: &'static str,
    },
    /// An argument did not parse.
    #[error("`{command}` cannot use `{value}`")]
    InvalidArgument {
        /// Command name.
        command: &'static str,
        /// The offending text.
        value: String,
    },
}

/// Classify one raw input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<InputLine>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    match line.strip_prefix('!') {
        Some(command) => parse_command(command).map(|command| Some(InputLine::Command(command))),
        None => Ok(Some(InputLine::Frame(line.to_owned()))),
    }
}

fn parse_command(text: &str) -> Result<SyncCommand, InputError> {
    let (name, rest) = match text.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (text, ""),
    };
    let action = match name {
        "reset" => return Ok(SyncCommand::Reset),
        "leave" => return Ok(SyncCommand::Leave),
        "buzz" => Action::Buzz { is_pass: false },
        "pass" => Action::Buzz { is_pass: true },
        "pause" => Action::Pause { pause: true },
        "resume" => Action::Pause { pause: false },
        "pick" => {
            let mut indices = rest.split_whitespace();
            let topic_idx = number("pick", indices.next(), "a category index")?;
            let val_idx = number("pick", indices.next(), "a value index")?;
            Action::Pick { topic_idx, val_idx }
        }
        "answer" => Action::Answer {
            answer: required("answer", rest, "the answer text")?.to_owned(),
        },
        "wager" => Action::Wager {
            wager: number("wager", Some(rest).filter(|rest| !rest.is_empty()), "an amount")?,
        },
        "confirm" => Action::Confirm {
            confirm: flag("confirm", rest)?,
        },
        "dispute" => Action::Dispute {
            dispute: flag("dispute", rest)?,
        },
        "protest" => Action::Protest {
            protest_for: required("protest", rest, "a player id")?.to_owned(),
        },
        other => return Err(InputError::UnknownCommand(other.to_owned())),
    };
    Ok(SyncCommand::Act(action))
}

fn required<'a>(command: &'static str, value: &'a str, argument: &'static str) -> Result<&'a str, InputError> {
    if value.is_empty() {
        return Err(InputError::MissingArgument { command, argument });
    }
    Ok(value)
}

fn number<T: std::str::FromStr>(
    command: &'static str,
    value: Option<&str>,
    argument: &'static str,
) -> Result<T, InputError> {
    let value = value.ok_or(InputError::MissingArgument { command, argument })?;
    value.parse().map_err(|_| InputError::InvalidArgument {
        command,
        value: value.to_owned(),
    })
}

fn flag(command: &'static str, value: &str) -> Result<bool, InputError> {
    match value {
        "" | "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        other => Err(InputError::InvalidArgument {
            command,
            value: other.to_owned(),
        }),
    }
}

/// Forward input lines until EOF: envelopes to `frames`, commands to `handle`.
pub async fn read_input<R>(reader: R, frames: mpsc::Sender<String>, handle: SyncHandle)
where
    R: AsyncRead + Unpin,
{
    let mut lines = LinesStream::new(BufReader::new(reader).lines());
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to read input");
                break;
            }
        };
        match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(InputLine::Frame(text))) => {
                if frames.send(text).await.is_err() {
                    debug!("frame receiver gone; stopping input");
                    break;
                }
            }
            Ok(Some(InputLine::Command(command))) => {
                if handle.send(command).is_err() {
                    debug!("sync driver gone; stopping input");
                    break;
                }
            }
            Err(err) => warn!(error = %err, "ignoring input line"),
        }
    }
    info!("input closed");
}

/// Write each outbound frame as one line until the channel closes.
pub async fn write_frames<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        let written = async {
            writer.write_all(frame.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(err) = written {
            warn!(error = %err, "failed to write outbound frame");
            break;
        }
    }
}
