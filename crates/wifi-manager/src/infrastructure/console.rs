//! Operator console: a line-oriented command interface on stdin/stdout.
//!
//! The console stands in for the operator window.  Each line is one command:
//!
//! ```text
//! issue <minutes>          generate a code (blank = cancel, garbage = default)
//! revoke <code>            end a code now
//! status                   list codes with users and remaining time
//! register <ip> <code>     queue a registration, as the captive page would
//! connect <ip> <mac>       attach a device to the simulated router
//! disconnect <ip>          detach it again
//! unblock                  lift every router block now
//! reset                    wipe the code store
//! help                     print this list
//! quit                     stop the service
//! ```
//!
//! [`Console::run`] is generic over the reader and writer so tests can drive it
//! from byte slices.

use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;
use wifi_core::{CodeId, DeviceId};

use crate::application::issue_codes::{CodeIssuer, DurationPolicy};
use crate::application::ports::{CodeStore, Router};
use crate::application::register_device::RegistrationRequest;
use crate::infrastructure::router::simulated::SimulatedRouter;

const HELP: &str = "commands: issue <minutes> | revoke <code> | status | \
register <ip> <code> | connect <ip> <mac> | disconnect <ip> | unblock | reset | help | quit";

/// Error type for console input that is not a valid command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("'{0}' is not an IP address")]
    InvalidIp(String),
}

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `None` when the operator left the duration blank.
    Issue(Option<u32>),
    Revoke(CodeId),
    Status,
    Register { ip: IpAddr, code: CodeId },
    Connect { ip: IpAddr, device: DeviceId },
    Disconnect(IpAddr),
    /// Lifts every router block.
    Unblock,
    /// Forgets every stored code and registration.
    Reset,
    Help,
    Quit,
}

impl Command {
    /// Parses one input line.  Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] describing what is wrong with the line.
    pub fn parse(line: &str, policy: &DurationPolicy) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "issue" => {
                let rest: Vec<&str> = words.collect();
                Self::Issue(policy.resolve(&rest.join(" ")))
            }
            "revoke" => Self::Revoke(code_arg(words.next(), "revoke")?),
            "status" | "list" => Self::Status,
            "register" => Self::Register {
                ip: ip_arg(words.next(), "register")?,
                code: code_arg(words.next(), "register")?,
            },
            "connect" => {
                let ip = ip_arg(words.next(), "connect")?;
                let device = words.next().ok_or(CommandError::MissingArgument {
                    command: "connect",
                    argument: "a hardware address",
                })?;
                Self::Connect {
                    ip,
                    device: DeviceId::from(device),
                }
            }
            "disconnect" => Self::Disconnect(ip_arg(words.next(), "disconnect")?),
            "unblock" => Self::Unblock,
            "reset" => Self::Reset,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn ip_arg(word: Option<&str>, command: &'static str) -> Result<IpAddr, CommandError> {
    let word = word.ok_or(CommandError::MissingArgument {
        command,
        argument: "an IP address",
    })?;
    word.parse()
        .map_err(|_| CommandError::InvalidIp(word.to_string()))
}

// Codes are generated upper-case; accept whatever case the operator typed.
fn code_arg(word: Option<&str>, command: &'static str) -> Result<CodeId, CommandError> {
    word.map(|w| CodeId::from(w.to_ascii_uppercase()))
        .ok_or(CommandError::MissingArgument {
            command,
            argument: "a code",
        })
}

/// What the console does after executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

pub struct Console {
    issuer: CodeIssuer,
    store: Arc<dyn CodeStore>,
    router: Arc<SimulatedRouter>,
    registrations: mpsc::Sender<RegistrationRequest>,
}

impl Console {
    pub fn new(
        issuer: CodeIssuer,
        store: Arc<dyn CodeStore>,
        router: Arc<SimulatedRouter>,
        registrations: mpsc::Sender<RegistrationRequest>,
    ) -> Self {
        Self {
            issuer,
            store,
            router,
            registrations,
        }
    }

    /// Executes one command and describes the result.
    pub async fn execute(&self, command: Command) -> Reply {
        debug!("console command: {command:?}");
        let text = match command {
            Command::Issue(None) => "cancelled".to_string(),
            Command::Issue(Some(duration)) => match self.issuer.issue(duration) {
                Ok(issued) => format!("issued {} for {} minutes", issued.code, issued.duration),
                Err(e) => format!("error: {e}"),
            },
            Command::Revoke(code) => match self.issuer.revoke(&code) {
                Ok(()) => format!("revoked {code}"),
                Err(e) => format!("error: {e}"),
            },
            Command::Status => self.status_text(),
            Command::Register { ip, code } => self.queue_registration(ip, code).await,
            Command::Connect { ip, device } => {
                self.router.connect(ip, device.clone());
                format!("connected {device} at {ip}")
            }
            Command::Disconnect(ip) => {
                self.router.disconnect(ip);
                format!("disconnected {ip}")
            }
            Command::Unblock => match self.router.unblock_all().await {
                Ok(()) => "unblocked all devices".to_string(),
                Err(e) => format!("error: {e}"),
            },
            Command::Reset => match self.issuer.reset() {
                Ok(()) => "code store reset".to_string(),
                Err(e) => format!("error: {e}"),
            },
            Command::Help => HELP.to_string(),
            Command::Quit => return Reply::Quit,
        };
        Reply::Text(text)
    }

    fn status_text(&self) -> String {
        match self.issuer.status() {
            Ok(rows) if rows.is_empty() => "no codes issued".to_string(),
            Ok(rows) => rows
                .iter()
                .map(|row| {
                    format!(
                        "{}  {}  users={}  remaining={}",
                        row.code,
                        if row.used { "used  " } else { "unused" },
                        row.users,
                        row.remaining
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("error: {e}"),
        }
    }

    async fn queue_registration(&self, ip: IpAddr, code: CodeId) -> String {
        let stored = match self.store.all_codes() {
            Ok(codes) => codes.into_iter().find(|c| c.code == code),
            Err(e) => return format!("error: {e}"),
        };
        let Some(stored) = stored else {
            return format!("error: unknown code {code}");
        };
        let request = RegistrationRequest {
            ip,
            code: stored.code,
            duration: stored.remaining,
        };
        match self.registrations.send(request).await {
            Ok(()) => format!("queued registration of {ip} with {code}"),
            Err(_) => "error: registration queue closed".to_string(),
        }
    }

    /// Reads commands from `input` until `quit` or end of input, writing one
    /// reply per command to `output`.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error on either stream.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let policy = self.issuer.policy();
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let reply = match Command::parse(&line, &policy) {
                Ok(None) => continue,
                Ok(Some(command)) => self.execute(command).await,
                Err(e) => Reply::Text(format!("error: {e}")),
            };
            match reply {
                Reply::Quit => break,
                Reply::Text(text) => {
                    output.write_all(text.as_bytes()).await?;
                    output.write_all(b"\n").await?;
                    output.flush().await?;
                }
            }
        }
        Ok(())
    }
}
