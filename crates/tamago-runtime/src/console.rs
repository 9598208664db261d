//! Operator console
//!
//! Line-oriented commands read from stdin by `tamagod`. Feeding and petting
//! only request a delta; the controller applies it.
//!
//! Input is read on a plain OS thread and handed over a channel, so a
//! blocked read never holds up runtime shutdown.

use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use tamago_core::{DeltaKind, Pet, PetKey, PetSpec, TamagoResult};
use tamago_reconcile::MemoryEmitter;
use tamago_store::{request_delta, ObjectStore, RetryPolicy};

/// Amount used by `feed` and `pet` when none is given
pub const DEFAULT_AMOUNT: i64 = 10;

/// Lines buffered between the reader thread and the console
pub const LINE_BUFFER: usize = 64;

pub const HELP: &str = "commands: feed <name> [amount] | pet <name> [amount] | status | events | \
                        add <name> <nickname> | remove <name> | help | quit";

/// A console line that could not be parsed
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CommandError(String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Feed { key: PetKey, amount: i64 },
    Pet { key: PetKey, amount: i64 },
    Status,
    Events,
    Add { key: PetKey, nickname: String },
    Remove { key: PetKey },
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError("empty command".into()));
        };
        let args: Vec<&str> = words.collect();

        let key = |i: usize| -> Result<PetKey, CommandError> {
            let raw = args
                .get(i)
                .ok_or_else(|| CommandError(format!("{verb}: missing pet name")))?;
            raw.parse::<PetKey>()
                .map_err(|e| CommandError(format!("{verb}: {e}")))
        };
        let amount = || -> Result<i64, CommandError> {
            match args.get(1) {
                Some(raw) => raw.parse::<i64>().map_err(|_| {
                    CommandError(format!("{verb}: amount must be an integer, got {raw:?}"))
                }),
                None => Ok(DEFAULT_AMOUNT),
            }
        };

        let command = match verb {
            "feed" => Command::Feed {
                key: key(0)?,
                amount: amount()?,
            },
            "pet" => Command::Pet {
                key: key(0)?,
                amount: amount()?,
            },
            "status" => Command::Status,
            "events" => Command::Events,
            "add" => {
                if args.len() < 2 {
                    return Err(CommandError("add: usage is add <name> <nickname>".into()));
                }
                Command::Add {
                    key: key(0)?,
                    nickname: args[1..].join(" "),
                }
            }
            "remove" => Command::Remove { key: key(0)? },
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError(format!("unknown command {other:?}; try help"))),
        };
        Ok(command)
    }
}

/// Result of running a command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Lines(Vec<String>),
    Quit,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Reply::Lines(vec![text.into()])
    }
}

/// Ten-cell text gauge of a vitality counter
pub fn gauge(value: i64) -> String {
    let full = (value.clamp(0, 100) / 10) as usize;
    format!("[{}{}]", "#".repeat(full), "-".repeat(10 - full))
}

/// One status line for a pet
pub fn status_line(pet: &Pet) -> String {
    let mut line = format!(
        "{} ({}): food {} {:>3}  love {} {:>3}",
        pet.key,
        pet.spec.nickname,
        gauge(pet.status.food),
        pet.status.food,
        gauge(pet.status.love),
        pet.status.love,
    );
    if !pet.status.initialized {
        line.push_str("  hatching");
    }
    if pet.has_pending_deltas() {
        line.push_str("  pending");
    }
    line
}

pub struct Console<S> {
    store: Arc<S>,
    events: Arc<MemoryEmitter>,
    retry: RetryPolicy,
}

impl<S: ObjectStore> Console<S> {
    pub fn new(store: Arc<S>, events: Arc<MemoryEmitter>, retry: RetryPolicy) -> Self {
        Console {
            store,
            events,
            retry,
        }
    }

    pub async fn execute(&self, command: Command) -> TamagoResult<Reply> {
        match command {
            Command::Feed { key, amount } => self.request(key, DeltaKind::Food, amount).await,
            Command::Pet { key, amount } => self.request(key, DeltaKind::Love, amount).await,
            Command::Status => {
                let pets = self.store.list().await?;
                if pets.is_empty() {
                    return Ok(Reply::line("no pets"));
                }
                Ok(Reply::Lines(pets.iter().map(status_line).collect()))
            }
            Command::Events => {
                let events = self.events.events();
                if events.is_empty() {
                    return Ok(Reply::line("no events"));
                }
                Ok(Reply::Lines(
                    events
                        .iter()
                        .map(|e| {
                            format!(
                                "{} {} {} {}: {}",
                                e.at.format("%H:%M:%S"),
                                e.severity.as_str(),
                                e.reason.as_str(),
                                e.key,
                                e.message
                            )
                        })
                        .collect(),
                ))
            }
            Command::Add { key, nickname } => {
                let pet = self.store.create(Pet::new(key, PetSpec::new(nickname))).await?;
                Ok(Reply::line(format!("added {} ({})", pet.key, pet.spec.nickname)))
            }
            Command::Remove { key } => {
                self.store.delete(&key).await?;
                Ok(Reply::line(format!("removed {key}")))
            }
            Command::Help => Ok(Reply::line(HELP)),
            Command::Quit => Ok(Reply::Quit),
        }
    }

    async fn request(&self, key: PetKey, kind: DeltaKind, amount: i64) -> TamagoResult<Reply> {
        let pending = request_delta(&*self.store, &key, kind, amount, &self.retry).await?;
        Ok(Reply::line(format!("{key}: {kind} {pending:+} pending")))
    }

    /// Handle lines until `quit` or until the sender side closes.
    ///
    /// Returns true when the operator asked to quit. Command errors are
    /// reported on `output` and do not stop the console.
    pub async fn run<W>(&self, mut lines: mpsc::Receiver<String>, mut output: W) -> TamagoResult<bool>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(line) = lines.recv().await {
            if line.trim().is_empty() {
                continue;
            }
            let reply = match line.parse::<Command>() {
                Ok(command) => match self.execute(command).await {
                    Ok(reply) => reply,
                    Err(e) => Reply::line(format!("error: {e}")),
                },
                Err(e) => Reply::line(format!("error: {e}")),
            };
            match reply {
                Reply::Quit => return Ok(true),
                Reply::Lines(texts) => {
                    for text in texts {
                        output.write_all(text.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                    }
                    output.flush().await?;
                }
            }
        }
        Ok(false)
    }
}

/// Read `input` line by line on a detached thread.
///
/// The channel closes at end of input or on a read error. The thread is
/// never joined; a read still blocked at exit dies with the process.
pub fn spawn_line_reader<R>(input: R) -> TamagoResult<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("tamago-console".into())
        .spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "console input failed");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}
